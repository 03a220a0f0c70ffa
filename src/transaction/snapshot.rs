use tracing::{debug, info};

use crate::core::Result;
use crate::network::{ScanConnection, SourceCatalog};

/// Opens the read-only repeatable-read transaction every scan session runs in.
pub const BEGIN_READ_ONLY: &str = "BEGIN TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY";

/// MVCC snapshot shared by the bind session and all worker sessions.
///
/// A primary exports its snapshot so every worker sees the same row versions.
/// A hot standby cannot export snapshots; workers then open their own
/// repeatable-read transactions without pinning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSnapshot {
    Exported(String),
    InRecovery,
}

impl ScanSnapshot {
    /// Begins the bind transaction on `conn` and exports its snapshot.
    ///
    /// The exported id is only valid while `conn` keeps this transaction open.
    pub async fn export<C>(conn: &C) -> Result<Self>
    where
        C: ScanConnection + SourceCatalog,
    {
        conn.execute(BEGIN_READ_ONLY).await?;
        if conn.is_in_recovery().await? {
            info!("source is in recovery, workers will not share a snapshot");
            return Ok(Self::InRecovery);
        }
        let id = conn.export_snapshot().await?;
        debug!(snapshot = %id, "exported snapshot");
        Ok(Self::Exported(id))
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Exported(id) => Some(id),
            Self::InRecovery => None,
        }
    }

    /// Starts a worker transaction on `conn` pinned to this snapshot.
    pub async fn attach<C: ScanConnection>(&self, conn: &C) -> Result<()> {
        conn.execute(BEGIN_READ_ONLY).await?;
        if let Some(id) = self.id() {
            conn.execute(&set_snapshot_statement(id)).await?;
        }
        Ok(())
    }
}

fn set_snapshot_statement(id: &str) -> String {
    format!("SET TRANSACTION SNAPSHOT '{}'", id.replace('\'', "''"))
}
