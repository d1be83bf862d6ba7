pub mod daemon;
pub mod model;
pub mod store;

pub use daemon::SchedulerDaemon;
pub use model::{
    AgentContextSpec, AgentTaskAction, CronSchedule, DurationSpec, IntervalSchedule, JobAction,
    JobId, JobPolicy, JobSchedule, JobTimezone, MisfirePolicy, OverlapPolicy, ScheduledJob,
};

pub use store::{JobStore, JobsFile};

