//! [`MemoryStore`]: an in-process [`ProfileStore`] for tests and demos.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  maintenance::ProfileUpdate,
  profile::{Capability, NewProfile, Profile},
  store::ProfileStore,
};

/// A profile store held in a mutex-guarded map.
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
  profiles:       Arc<Mutex<HashMap<Uuid, Profile>>>,
  reject_batches: Arc<AtomicBool>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Make every subsequent [`ProfileStore::commit_yearly_batch`] fail, to
  /// exercise the all-or-nothing path.
  pub fn reject_batches(&self, reject: bool) {
    self.reject_batches.store(reject, Ordering::SeqCst);
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Profile>> {
    // A poisoned map is still consistent: every write is a whole-value insert.
    self.profiles.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn modify(
    &self,
    uid: Uuid,
    f: impl FnOnce(&mut Profile) -> Result<()>,
  ) -> Result<Profile> {
    let mut profiles = self.lock();
    let current = profiles.get(&uid).ok_or(Error::ProfileNotFound(uid))?;
    let mut updated = current.clone();
    f(&mut updated)?;
    profiles.insert(uid, updated.clone());
    Ok(updated)
  }
}

impl ProfileStore for MemoryStore {
  type Error = Error;

  async fn create_profile(&self, input: NewProfile) -> Result<Profile> {
    let profile = Profile::new(input, Utc::now());
    self.lock().insert(profile.uid, profile.clone());
    Ok(profile)
  }

  async fn import_profile(&self, profile: Profile) -> Result<Profile> {
    self.lock().insert(profile.uid, profile.clone());
    Ok(profile)
  }

  async fn get_profile(&self, uid: Uuid) -> Result<Option<Profile>> {
    Ok(self.lock().get(&uid).cloned())
  }

  async fn list_profiles(&self) -> Result<Vec<Profile>> {
    let mut all: Vec<Profile> = self.lock().values().cloned().collect();
    all.sort_by_key(|p| (p.created_at, p.uid));
    Ok(all)
  }

  async fn list_enrolled(&self) -> Result<Vec<Profile>> {
    let mut all = self.list_profiles().await?;
    all.retain(Profile::is_enrolled);
    Ok(all)
  }

  async fn grant_access(
    &self,
    uid: Uuid,
    capability: Capability,
    granted_by: String,
    now: DateTime<Utc>,
  ) -> Result<Profile> {
    self.modify(uid, |p| p.apply_grant(capability, &granted_by, now))
  }

  async fn revoke_access(
    &self,
    uid: Uuid,
    capability: Capability,
  ) -> Result<Profile> {
    self.modify(uid, |p| {
      p.apply_revoke(capability);
      Ok(())
    })
  }

  async fn credit_points(
    &self,
    uid: Uuid,
    year: i32,
    points: u64,
  ) -> Result<Profile> {
    self.modify(uid, |p| p.apply_credit(year, points))
  }

  async fn redeem_points(&self, uid: Uuid, points: u64) -> Result<Profile> {
    self.modify(uid, |p| p.apply_redemption(points))
  }

  async fn commit_yearly_batch(&self, updates: Vec<ProfileUpdate>) -> Result<()> {
    if self.reject_batches.load(Ordering::SeqCst) {
      return Err(Error::Backend("batch write rejected".into()));
    }

    let mut profiles = self.lock();
    for update in &updates {
      let profile = profiles
        .get(&update.uid)
        .ok_or(Error::ProfileNotFound(update.uid))?;
      if profile.points_expirations.contains_key(&update.year) {
        return Err(Error::ExpirationExists {
          uid:  update.uid,
          year: update.year,
        });
      }
    }
    for update in &updates {
      if let Some(profile) = profiles.get_mut(&update.uid) {
        profile.apply_update(update);
      }
    }
    Ok(())
  }
}
