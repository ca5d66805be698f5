//! Transport contract toward the storage engine.
//!
//! The underlying connection is a single serialized resource: one connection
//! is opened per logical operation, used for every statement in it, and
//! closed on every exit path — success or failure — before an error is
//! allowed to propagate. There is no pooling, no automatic retry, and no
//! mid-query cancellation. A transaction, once begun, ends in exactly one of
//! commit or rollback; beginning a second transaction while one is open is a
//! usage error, not a queued wait.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::record::Record;

/// Connection + statement execution as exposed by the storage driver.
///
/// `execute` returns raw rows: column alias to raw value, exactly as the
/// engine produced them — casting happens above this boundary.
pub trait Transport: Send {
    /// Open the connection.
    fn open(&mut self) -> Result<()>;

    /// Close the connection. Infallible by contract; drivers swallow close
    /// failures after logging them.
    fn close(&mut self);

    /// Run one SQL statement, returning raw rows.
    fn execute(&mut self, sql: &str) -> Result<Vec<Record>>;

    /// Begin a transaction. [`Error::Usage`] if one is already open.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll the open transaction back.
    fn rollback(&mut self) -> Result<()>;
}

/// A transport shared by every gateway in one registry.
pub type SharedTransport = Arc<Mutex<dyn Transport>>;

/// Wrap a concrete transport for registry use.
pub fn shared<T: Transport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}

/// Run `f` against an opened connection, closing it on every exit path.
pub fn scope<T>(
    transport: &SharedTransport,
    f: impl FnOnce(&mut dyn Transport) -> Result<T>,
) -> Result<T> {
    let mut conn = transport
        .lock()
        .map_err(|_| Error::database("transport lock poisoned"))?;
    conn.open()?;
    let outcome = f(&mut *conn);
    conn.close();
    outcome
}

/// Run `f` inside begin/commit, rolling back on error.
///
/// The connection must already be open (use inside [`scope`]). A rollback
/// failure is logged and the original error still propagates.
pub fn transaction<T>(
    conn: &mut dyn Transport,
    f: impl FnOnce(&mut dyn Transport) -> Result<T>,
) -> Result<T> {
    conn.begin()?;
    match f(conn) {
        Ok(value) => {
            conn.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rb) = conn.rollback() {
                tracing::warn!(error = %rb, "rollback failed after {err}");
            }
            Err(err)
        }
    }
}
