//! A factory decorator that shares one connection across template calls.
//!
//! Vendor factories open a fresh session per call, so a transaction can never
//! span two template operations. Wrapping a factory in
//! [`SingleConnectionFactory`] connects once, lends the same session to every
//! call, and moves the transaction boundary to the factory: the caller decides
//! when to `commit()` or `rollback()`.

use super::connection::{Connection, Cursor};
use super::factory::ConnectionFactory;
use super::translator::{Dialect, SqlSyntax};
use crate::error::{DbError, DbResult};
use crate::models::RequiredType;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

enum Slot {
    /// Not connected yet, or closed.
    Empty,
    Idle(Box<dyn Connection>),
    /// Lent to a template call.
    Lent,
}

pub struct SingleConnectionFactory {
    target: Arc<dyn ConnectionFactory>,
    slot: Arc<Mutex<Slot>>,
}

impl SingleConnectionFactory {
    pub fn new(target: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            target,
            slot: Arc::new(Mutex::new(Slot::Empty)),
        }
    }

    /// The wrapped factory.
    pub fn target(&self) -> &Arc<dyn ConnectionFactory> {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        !matches!(*self.lock(), Slot::Empty)
    }

    /// Commit the shared session. A no-op if it was never opened.
    pub fn commit(&self) -> DbResult<()> {
        self.with_idle("commit", |conn| conn.commit())
    }

    /// Roll back the shared session. A no-op if it was never opened.
    pub fn rollback(&self) -> DbResult<()> {
        self.with_idle("rollback", |conn| conn.rollback())
    }

    /// Close the shared session; the next `connect()` opens a new one.
    pub fn close(&self) -> DbResult<()> {
        let mut slot = self.lock();
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Empty => Ok(()),
            Slot::Idle(mut conn) => {
                info!(vendor = self.target.name(), "Closing shared connection");
                conn.close()
            }
            Slot::Lent => {
                *slot = Slot::Lent;
                Err(busy("close"))
            }
        }
    }

    fn with_idle(
        &self,
        action: &'static str,
        f: impl FnOnce(&mut Box<dyn Connection>) -> DbResult<()>,
    ) -> DbResult<()> {
        let mut slot = self.lock();
        match &mut *slot {
            Slot::Empty => {
                debug!(vendor = self.target.name(), action, "No shared connection open");
                Ok(())
            }
            Slot::Idle(conn) => f(conn),
            Slot::Lent => Err(busy(action)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }
}

impl fmt::Debug for SingleConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.lock() {
            Slot::Empty => "empty",
            Slot::Idle(_) => "idle",
            Slot::Lent => "lent",
        };
        f.debug_struct("SingleConnectionFactory")
            .field("target", &self.target)
            .field("state", &state)
            .finish()
    }
}

impl ConnectionFactory for SingleConnectionFactory {
    fn name(&self) -> &str {
        self.target.name()
    }

    fn dialect(&self) -> Dialect {
        self.target.dialect()
    }

    fn syntax(&self) -> SqlSyntax {
        self.target.syntax()
    }

    fn count_type(&self) -> RequiredType {
        self.target.count_type()
    }

    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        let mut slot = self.lock();
        let conn = match std::mem::replace(&mut *slot, Slot::Lent) {
            Slot::Idle(conn) => conn,
            Slot::Empty => match self.target.connect() {
                Ok(conn) => conn,
                Err(e) => {
                    *slot = Slot::Empty;
                    return Err(e);
                }
            },
            Slot::Lent => return Err(busy("connect")),
        };
        Ok(Box::new(SharedConnection {
            conn: Some(conn),
            slot: Arc::clone(&self.slot),
        }))
    }
}

/// The shared session as lent to one template call.
///
/// `close()` (or dropping the handle) returns the session to the factory
/// instead of closing it.
struct SharedConnection {
    conn: Option<Box<dyn Connection>>,
    slot: Arc<Mutex<Slot>>,
}

impl SharedConnection {
    fn inner(&mut self) -> DbResult<&mut Box<dyn Connection>> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::connection_busy("shared connection handle already returned"))
    }

    fn give_back(&mut self) {
        if let Some(conn) = self.conn.take() {
            *lock_slot(&self.slot) = Slot::Idle(conn);
        }
    }
}

impl Connection for SharedConnection {
    fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>> {
        self.inner()?.cursor()
    }

    fn commit(&mut self) -> DbResult<()> {
        self.inner()?.commit()
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.inner()?.rollback()
    }

    fn close(&mut self) -> DbResult<()> {
        self.give_back();
        Ok(())
    }
}

impl Drop for SharedConnection {
    fn drop(&mut self) {
        self.give_back();
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn busy(action: &str) -> DbError {
    DbError::connection_busy(format!(
        "cannot {action}: the shared connection is lent to another call"
    ))
}
