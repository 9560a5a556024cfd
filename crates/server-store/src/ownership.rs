//! Ownership Enforcer (§4.2): first-writer-wins store provisioning.

use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::error::{Result, StoreError};
use crate::schema::sync_stores;

/// Ensures `storeId` is owned by `ownerId`.
///
/// The first caller to mention a `storeId` provisions it (`head=0`); every
/// later caller either agrees with the owner already on file or is rejected.
/// A store has exactly one owner for its whole lifetime (§4.2, §3 invariant 4).
pub fn ensure_store_owner(conn: &mut PgConnection, store_id: &str, owner_id: &str) -> Result<()> {
    conn.transaction::<_, StoreError, _>(|conn| {
        diesel::insert_into(sync_stores::table)
            .values((
                sync_stores::store_id.eq(store_id),
                sync_stores::owner_id.eq(owner_id),
                sync_stores::head.eq(0_i64),
            ))
            .on_conflict(sync_stores::store_id)
            .do_nothing()
            .execute(conn)?;

        let existing_owner: String = sync_stores::table
            .filter(sync_stores::store_id.eq(store_id))
            .select(sync_stores::owner_id)
            .for_update()
            .first(conn)?;

        if existing_owner != owner_id {
            return Err(StoreError::AccessDenied {
                store_id: store_id.to_string(),
                existing_owner,
                requested_owner: owner_id.to_string(),
            });
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    //! Exercised against a real Postgres instance in `tests/` (requires
    //! `DATABASE_URL`); no in-memory Postgres fake is maintained here.
}
