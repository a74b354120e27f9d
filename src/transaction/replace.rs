// DDL Replace
//
// ALTER is delete-then-create. Outside a transaction the two steps run in
// their own transaction. Inside a caller's transaction no demarcation is
// done; a failed create is undone by recreating the saved definition.

use log::{debug, warn};

use crate::catalog::ObjectDef;
use crate::query::executor::result::{QueryError, QueryResult};
use super::TransactionManager;

/// Replace the stored definition of `new_def.kind()` named `new_def.name()`
pub fn replace_object(tm: &TransactionManager, new_def: ObjectDef) -> QueryResult<()> {
    let kind = new_def.kind();
    let name = new_def.name().to_string();
    let db = tm.database();
    if !db.object_exists(kind, &name) {
        return Err(QueryError::ObjectNotFound { kind, name });
    }

    if tm.is_outermost() {
        debug!("replace {} '{}' in its own transaction", kind, name);
        tm.begin_transaction()?;
        let outcome = db
            .delete_object(kind, &name)
            .and_then(|_| db.create_object(new_def));
        match outcome {
            Ok(()) => tm.commit_transaction(),
            Err(err) => {
                if let Err(rollback_err) = tm.abort_transaction() {
                    warn!("rollback after failed replace of {} '{}' failed: {}", kind, name, rollback_err);
                }
                Err(err.into())
            }
        }
    } else {
        debug!("replace {} '{}' inside transaction level {}", kind, name, tm.nested_level());
        let original = db.delete_object(kind, &name)?;
        if let Err(err) = db.create_object(new_def) {
            warn!("restoring {} '{}' after failed replace: {}", kind, name, err);
            if let Err(restore_err) = db.create_object(original) {
                warn!("could not restore {} '{}': {}", kind, name, restore_err);
            }
            return Err(err.into());
        }
        Ok(())
    }
}
