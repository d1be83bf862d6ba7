//! PTY (Pseudo-Terminal) Management Module
//!
//! Handles spawning and managing pseudo-terminals for the TUI.

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// PTY Manager - handles a pseudo-terminal session
#[derive(Debug)]
pub struct PtyManager {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    is_running: bool,
}

impl PtyManager {
    /// Create a new PTY manager
    pub fn new() -> Self {
        Self {
            tx: None,
            is_running: false,
        }
    }
    
    /// Check if the PTY is running
    #[allow(dead_code)]
    pub fn is_running(&self) -> bool {
        self.is_running
    }
    
    /// Write data to the PTY
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(data.to_vec());
        }
        Ok(())
    }
    
    /// Resize the PTY
    #[allow(dead_code)]
    pub fn resize(&mut self, _rows: u16, _cols: u16) -> Result<()> {
        // PTY resizing would be implemented here
        Ok(())
    }
    
    /// Stop the PTY
    #[allow(dead_code)]
    pub fn stop(&mut self) {
        self.is_running = false;
        self.tx = None;
    }
}

impl Default for PtyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PtyManager {
    fn clone(&self) -> Self {
        Self {
            tx: None, // Channel can't be cloned
            is_running: self.is_running,
        }
    }
}

/// Spawn a new PTY with the given working directory
pub fn spawn_pty(
    _working_dir: PathBuf,
) -> Result<(PtyManager, mpsc::Receiver<Vec<u8>>)> {
    let (tx, rx) = mpsc::channel(100);
    
    let manager = PtyManager {
        tx: Some(tx),
        is_running: true,
    };
    
    // In a real implementation, this would spawn an actual PTY
    // For now, we return a stub that just accepts input
    
    Ok((manager, rx))
}
