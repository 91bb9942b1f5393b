//! [`SqliteStore`]: the SQLite implementation of [`ProfileStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use reef_core::{
  maintenance::ProfileUpdate,
  profile::{Capability, NewProfile, Profile},
  store::ProfileStore,
};

use crate::{
  Error, Result,
  encode::{
    ProfileRow, RawExpiration, RawGrant, RawProfile, RawProfileBundle,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row access ──────────────────────────────────────────────────────────────
//
// These run on the connection thread, inside `Connection::call`, and are
// shared between plain reads and transactions (`Transaction` derefs to
// `Connection`).

const PROFILE_COLUMNS: &str = "uid, display_name, email, created_at, \
                               lifetime_points, redeemable_points, join_date, \
                               last_expiration_check";

fn map_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
  Ok(RawProfile {
    uid:                   row.get(0)?,
    display_name:          row.get(1)?,
    email:                 row.get(2)?,
    created_at:            row.get(3)?,
    lifetime_points:       row.get(4)?,
    redeemable_points:     row.get(5)?,
    join_date:             row.get(6)?,
    last_expiration_check: row.get(7)?,
  })
}

/// Load the child rows for `raw` and decode the whole profile.
fn assemble(conn: &Connection, raw: RawProfile) -> Result<Profile> {
  let yearly = conn
    .prepare_cached(
      "SELECT year, points FROM yearly_points WHERE uid = ?1 ORDER BY year",
    )?
    .query_map([&raw.uid], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let expirations = conn
    .prepare_cached(
      "SELECT year, points_reduced, reason, recorded_at
       FROM points_expirations WHERE uid = ?1 ORDER BY year",
    )?
    .query_map([&raw.uid], |row| {
      Ok(RawExpiration {
        year:           row.get(0)?,
        points_reduced: row.get(1)?,
        reason:         row.get(2)?,
        recorded_at:    row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let grants = conn
    .prepare_cached(
      "SELECT capability, has_access, granted_at, granted_by
       FROM access_grants WHERE uid = ?1",
    )?
    .query_map([&raw.uid], |row| {
      Ok(RawGrant {
        capability: row.get(0)?,
        has_access: row.get(1)?,
        granted_at: row.get(2)?,
        granted_by: row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  RawProfileBundle { profile: raw, yearly, expirations, grants }.into_profile()
}

fn read_profile(conn: &Connection, uid: Uuid) -> Result<Option<Profile>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE uid = ?1"),
      [encode_uuid(uid)],
      map_profile_row,
    )
    .optional()?;

  raw.map(|raw| assemble(conn, raw)).transpose()
}

fn read_profiles(conn: &Connection, enrolled_only: bool) -> Result<Vec<Profile>> {
  let filter = if enrolled_only {
    "WHERE join_date IS NOT NULL"
  } else {
    ""
  };
  let raws = conn
    .prepare(&format!(
      "SELECT {PROFILE_COLUMNS} FROM profiles {filter} ORDER BY created_at, uid"
    ))?
    .query_map([], map_profile_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(|raw| assemble(conn, raw)).collect()
}

/// Upsert `profile` and replace its balances, counters and grants.
/// Existing expiration rows are left as they are.
fn write_profile(conn: &Connection, profile: &Profile) -> Result<()> {
  let row = ProfileRow::encode(profile)?;

  conn.execute(
    "INSERT INTO profiles (
       uid, display_name, email, created_at,
       lifetime_points, redeemable_points, join_date, last_expiration_check
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT (uid) DO UPDATE SET
       display_name          = excluded.display_name,
       email                 = excluded.email,
       created_at            = excluded.created_at,
       lifetime_points       = excluded.lifetime_points,
       redeemable_points     = excluded.redeemable_points,
       join_date             = excluded.join_date,
       last_expiration_check = excluded.last_expiration_check",
    rusqlite::params![
      row.uid,
      row.display_name,
      row.email,
      row.created_at,
      row.lifetime_points,
      row.redeemable_points,
      row.join_date,
      row.last_expiration_check,
    ],
  )?;

  conn.execute("DELETE FROM yearly_points WHERE uid = ?1", [&row.uid])?;
  for (year, points) in &row.yearly {
    conn
      .prepare_cached(
        "INSERT INTO yearly_points (uid, year, points) VALUES (?1, ?2, ?3)",
      )?
      .execute(rusqlite::params![row.uid, year, points])?;
  }

  for (year, reduced, reason, at) in &row.expirations {
    conn
      .prepare_cached(
        "INSERT INTO points_expirations (uid, year, points_reduced, reason, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (uid, year) DO NOTHING",
      )?
      .execute(rusqlite::params![row.uid, year, reduced, reason, at])?;
  }

  conn.execute("DELETE FROM access_grants WHERE uid = ?1", [&row.uid])?;
  for (capability, has_access, granted_at, granted_by) in &row.grants {
    conn
      .prepare_cached(
        "INSERT INTO access_grants (uid, capability, has_access, granted_at, granted_by)
         VALUES (?1, ?2, ?3, ?4, ?5)",
      )?
      .execute(rusqlite::params![
        row.uid, capability, has_access, granted_at, granted_by
      ])?;
  }

  Ok(())
}

/// Read, change, write back. Runs inside the caller's transaction.
fn modify_in(
  conn: &Connection,
  uid: Uuid,
  f: impl FnOnce(&mut Profile) -> reef_core::Result<()>,
) -> Result<Profile> {
  let mut profile = read_profile(conn, uid)?
    .ok_or(reef_core::Error::ProfileNotFound(uid))?;
  f(&mut profile)?;
  write_profile(conn, &profile)?;
  Ok(profile)
}

fn apply_batch(conn: &Connection, updates: &[ProfileUpdate]) -> Result<()> {
  for update in updates {
    let mut profile = read_profile(conn, update.uid)?
      .ok_or(reef_core::Error::ProfileNotFound(update.uid))?;
    if profile.points_expirations.contains_key(&update.year) {
      return Err(
        reef_core::Error::ExpirationExists {
          uid:  update.uid,
          year: update.year,
        }
        .into(),
      );
    }
    profile.apply_update(update);
    write_profile(conn, &profile)?;
  }
  Ok(())
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Reef profile store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` against a profile inside a transaction; commit only if both
  /// the domain rule and the write succeed.
  async fn modify<F>(&self, uid: Uuid, f: F) -> Result<Profile>
  where
    F: FnOnce(&mut Profile) -> reef_core::Result<()> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = modify_in(&tx, uid, f);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?
  }
}

// ─── ProfileStore impl ───────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  type Error = Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn create_profile(&self, input: NewProfile) -> Result<Profile> {
    let profile = Profile::new(input, Utc::now());
    let to_write = profile.clone();

    self
      .conn
      .call(move |conn| Ok(write_profile(conn, &to_write)))
      .await??;

    Ok(profile)
  }

  async fn import_profile(&self, profile: Profile) -> Result<Profile> {
    let to_write = profile.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = write_profile(&tx, &to_write);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await??;

    Ok(profile)
  }

  async fn get_profile(&self, uid: Uuid) -> Result<Option<Profile>> {
    self.conn.call(move |conn| Ok(read_profile(conn, uid))).await?
  }

  async fn list_profiles(&self) -> Result<Vec<Profile>> {
    self.conn.call(|conn| Ok(read_profiles(conn, false))).await?
  }

  async fn list_enrolled(&self) -> Result<Vec<Profile>> {
    self.conn.call(|conn| Ok(read_profiles(conn, true))).await?
  }

  // ── Capabilities ──────────────────────────────────────────────────────────

  async fn grant_access(
    &self,
    uid: Uuid,
    capability: Capability,
    granted_by: String,
    now: DateTime<Utc>,
  ) -> Result<Profile> {
    self
      .modify(uid, move |p| p.apply_grant(capability, &granted_by, now))
      .await
  }

  async fn revoke_access(
    &self,
    uid: Uuid,
    capability: Capability,
  ) -> Result<Profile> {
    self
      .modify(uid, move |p| {
        p.apply_revoke(capability);
        Ok(())
      })
      .await
  }

  // ── Points ────────────────────────────────────────────────────────────────

  async fn credit_points(
    &self,
    uid: Uuid,
    year: i32,
    points: u64,
  ) -> Result<Profile> {
    self.modify(uid, move |p| p.apply_credit(year, points)).await
  }

  async fn redeem_points(&self, uid: Uuid, points: u64) -> Result<Profile> {
    self.modify(uid, move |p| p.apply_redemption(points)).await
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn commit_yearly_batch(&self, updates: Vec<ProfileUpdate>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = apply_batch(&tx, &updates);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?
  }
}
