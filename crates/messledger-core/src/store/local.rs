use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rand::{rngs::OsRng, Rng, RngCore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::StoreError;
use crate::auth::SessionData;
use crate::models::{
    JoinRequest, JoinStatus, Mess, Month, NewMess, NewMonth, NewUser, Record, Resource, Role,
    Scope, User,
};

/// File stem of the session slot
const SESSION_SLOT: &str = "current_user";

/// Join code alphabet, without look-alike characters (0/O, 1/I)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Random unique identifier in UUID v4 text form.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn generate_code() -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[OsRng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Stored password hash for a locally registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    user_id: String,
    email: String,
    password_hash: String,
}

impl Record for Credential {
    const COLLECTION: &'static str = "credentials";

    fn id(&self) -> &str {
        &self.user_id
    }
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| StoreError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Hash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// The existing mess `user` manages, if any
fn managed_mess<'a>(user: &'a User, messes: &[Mess]) -> Option<&'a str> {
    let mess_id = user.mess_id.as_deref()?;
    (user.is_manager() && messes.iter().any(|m| m.id == mess_id)).then_some(mess_id)
}

/// Client-local persistent store with one JSON file per collection.
pub struct LocalStore {
    dir: PathBuf,
    write_locks: Mutex<HashMap<&'static str, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io("data directory", e))?;
        Ok(Self {
            dir,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.collection_path(name);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(name, e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::corrupt(name, e))
    }

    /// Replace the whole file: write a uniquely named sibling temp file, then
    /// rename over. Concurrent writers never share a temp file.
    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.collection_path(name);
        let tmp = self.dir.join(format!("{}.json.{}.tmp", name, Uuid::new_v4()));
        let contents =
            serde_json::to_string_pretty(value).map_err(|e| StoreError::corrupt(name, e))?;
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StoreError::io(name, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(name, e))
    }

    /// Load a full collection without taking its write lock.
    pub(crate) async fn load<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        Ok(self
            .read_json::<Vec<T>>(T::COLLECTION)
            .await?
            .unwrap_or_default())
    }

    /// Overwrite a full collection without taking its write lock.
    ///
    /// A `load` / modify / `save` cycle that is not wrapped in
    /// [`mutate`](Self::mutate) can lose a concurrent writer's update.
    pub(crate) async fn save<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        self.write_json(T::COLLECTION, records).await
    }

    fn write_lock(&self, collection: &'static str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.write_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(collection).or_default())
    }

    /// The single write path of a collection: load, apply `f`, rewrite,
    /// all while holding the collection's lock.
    pub async fn mutate<T, R, F>(&self, f: F) -> Result<R, StoreError>
    where
        T: Record,
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let lock = self.write_lock(T::COLLECTION);
        let _guard = lock.lock().await;

        let mut records = self.load::<T>().await?;
        let out = f(&mut records);
        self.save(&records).await?;
        Ok(out)
    }

    // ===== Generic reads =====

    pub async fn list<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.load().await
    }

    /// Full scan of the collection filtered by `pred`
    pub async fn filter<T, P>(&self, pred: P) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        P: Fn(&T) -> bool,
    {
        let records: Vec<T> = self.load().await?;
        let matched: Vec<T> = records.into_iter().filter(|r| pred(r)).collect();
        debug!(collection = T::COLLECTION, matched = matched.len(), "Local scan");
        Ok(matched)
    }

    pub async fn get<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.load::<T>().await?.into_iter().find(|r| r.id() == id))
    }

    pub async fn list_scoped<R: Resource>(&self, scope: &Scope) -> Result<Vec<R>, StoreError> {
        self.filter(|r: &R| r.scope() == *scope).await
    }

    // ===== Generic writes =====

    pub async fn insert<T: Record>(&self, record: T) -> Result<T, StoreError> {
        self.mutate(move |records: &mut Vec<T>| {
            records.push(record.clone());
            T::reconcile(records, &record);
            record
        })
        .await
    }

    /// Apply `f` to the record with `id`. `None` if there is no such record.
    pub async fn update<T, F>(&self, id: &str, f: F) -> Result<Option<T>, StoreError>
    where
        T: Record,
        F: FnOnce(&mut T),
    {
        self.mutate(|records: &mut Vec<T>| {
            let record = records.iter_mut().find(|r| r.id() == id)?;
            f(record);
            let updated = record.clone();
            T::reconcile(records, &updated);
            Some(updated)
        })
        .await
    }

    /// Delete the record with `id`. `false` if there was no such record.
    pub async fn remove<T: Record>(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|records: &mut Vec<T>| {
            let before = records.len();
            records.retain(|r| r.id() != id);
            records.len() != before
        })
        .await
    }

    pub async fn create<R: Resource>(&self, draft: R::Draft) -> Result<R, StoreError> {
        self.insert(R::from_draft(generate_id(), Utc::now(), draft))
            .await
    }

    pub async fn apply_patch<R: Resource>(
        &self,
        id: &str,
        patch: R::Patch,
    ) -> Result<Option<R>, StoreError> {
        self.update(id, |record: &mut R| record.apply(patch)).await
    }

    // ===== Months =====

    /// Insert a month. An active month deactivates every other month of the
    /// same mess in the same locked write.
    pub async fn create_month(&self, draft: NewMonth) -> Result<Month, StoreError> {
        self.create::<Month>(draft).await
    }

    pub async fn active_month(&self, mess_id: &str) -> Result<Option<Month>, StoreError> {
        Ok(self
            .filter(|m: &Month| m.mess_id == mess_id && m.is_active)
            .await?
            .into_iter()
            .next())
    }

    // ===== Users & auth =====

    /// Register a user with a hashed password. `None` if the email is taken.
    pub async fn register_user(&self, new_user: NewUser) -> Result<Option<User>, StoreError> {
        let password_hash = hash_password(&new_user.password)?;
        let email = new_user.email.trim().to_lowercase();

        let user = User {
            id: generate_id(),
            name: new_user.name,
            email: email.clone(),
            phone: new_user.phone,
            role: Role::Member,
            mess_id: None,
            is_approved: false,
            is_active: true,
            created_at: Utc::now(),
        };

        let inserted = self
            .mutate(|users: &mut Vec<User>| {
                if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
                    return None;
                }
                users.push(user.clone());
                Some(user)
            })
            .await?;

        if let Some(ref user) = inserted {
            let credential = Credential {
                user_id: user.id.clone(),
                email,
                password_hash,
            };
            self.mutate(|creds: &mut Vec<Credential>| {
                creds.retain(|c| c.user_id != credential.user_id);
                creds.push(credential);
            })
            .await?;
        }
        Ok(inserted)
    }

    /// The user with this email and password, if any
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        let credential = self
            .filter(|c: &Credential| c.email == email)
            .await?
            .into_iter()
            .next();

        match credential {
            Some(c) if verify_password(password, &c.password_hash) => {
                self.get::<User>(&c.user_id).await
            }
            _ => Ok(None),
        }
    }

    /// Every user attached to the mess, approved or not
    pub async fn mess_users(&self, mess_id: &str) -> Result<Vec<User>, StoreError> {
        self.filter(|u: &User| u.mess_id.as_deref() == Some(mess_id))
            .await
    }

    /// Detach a member from their mess. The manager cannot be removed.
    pub async fn remove_member(&self, user_id: &str) -> Result<bool, StoreError> {
        self.mutate(|users: &mut Vec<User>| {
            match users.iter_mut().find(|u| u.id == user_id) {
                Some(user) if !user.is_manager() => {
                    user.mess_id = None;
                    user.is_approved = false;
                    true
                }
                _ => false,
            }
        })
        .await
    }

    // ===== Messes =====

    /// Create a mess with a fresh join code and make its creator the manager.
    /// `None` if the creator is unknown or already manages a mess.
    pub async fn create_mess(&self, new_mess: NewMess) -> Result<Option<Mess>, StoreError> {
        let mess_lock = self.write_lock(Mess::COLLECTION);
        let _guard = mess_lock.lock().await;

        let mut messes = self.load::<Mess>().await?;
        let mess_id = generate_id();
        let promoted = self
            .mutate(|users: &mut Vec<User>| {
                match users.iter_mut().find(|u| u.id == new_mess.manager_id) {
                    Some(user) if managed_mess(user, &messes).is_none() => {
                        user.role = Role::Manager;
                        user.mess_id = Some(mess_id.clone());
                        user.is_approved = true;
                        true
                    }
                    _ => false,
                }
            })
            .await?;
        if !promoted {
            debug!(manager = %new_mess.manager_id, "Mess not created, manager unavailable");
            return Ok(None);
        }

        let code = loop {
            let code = generate_code();
            if !messes.iter().any(|m| m.code == code) {
                break code;
            }
        };
        let mess = Mess {
            id: mess_id,
            name: new_mess.name,
            code,
            manager_id: new_mess.manager_id,
            address: new_mess.address,
            created_at: Utc::now(),
        };
        messes.push(mess.clone());
        self.save(&messes).await?;
        Ok(Some(mess))
    }

    pub async fn find_mess_by_code(&self, code: &str) -> Result<Option<Mess>, StoreError> {
        let code = code.trim().to_uppercase();
        Ok(self
            .filter(|m: &Mess| m.code == code)
            .await?
            .into_iter()
            .next())
    }

    /// Hand the manager role to another current member. Returns `None` when
    /// the mess does not exist or the user is not one of its members.
    pub async fn transfer_manager(
        &self,
        mess_id: &str,
        new_manager_id: &str,
    ) -> Result<Option<Mess>, StoreError> {
        if self.get::<Mess>(mess_id).await?.is_none() {
            return Ok(None);
        }

        let swapped = self
            .mutate(|users: &mut Vec<User>| {
                let eligible = users
                    .iter()
                    .any(|u| u.id == new_manager_id && u.is_current_member_of(mess_id));
                if !eligible {
                    return false;
                }
                for user in users.iter_mut() {
                    if user.mess_id.as_deref() != Some(mess_id) {
                        continue;
                    }
                    user.role = if user.id == new_manager_id {
                        Role::Manager
                    } else {
                        Role::Member
                    };
                }
                true
            })
            .await?;

        if !swapped {
            return Ok(None);
        }
        self.update(mess_id, |mess: &mut Mess| {
            mess.manager_id = new_manager_id.to_string();
        })
        .await
    }

    // ===== Join requests =====

    /// Approve a pending request and attach its user to the mess.
    ///
    /// `None` if the request is missing or already decided, or if its user
    /// manages a different mess.
    pub async fn approve_join_request(
        &self,
        request_id: &str,
    ) -> Result<Option<JoinRequest>, StoreError> {
        let request_lock = self.write_lock(JoinRequest::COLLECTION);
        let _guard = request_lock.lock().await;

        let mut requests = self.load::<JoinRequest>().await?;
        let Some(request) = requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == JoinStatus::Pending)
        else {
            return Ok(None);
        };

        let messes = self.load::<Mess>().await?;
        let attached = self
            .mutate(|users: &mut Vec<User>| {
                let Some(user) = users.iter_mut().find(|u| u.id == request.user_id) else {
                    return false;
                };
                match managed_mess(user, &messes).map(|managed| managed == request.mess_id) {
                    Some(same_mess) => same_mess,
                    None => {
                        user.mess_id = Some(request.mess_id.clone());
                        user.is_approved = true;
                        user.role = Role::Member;
                        true
                    }
                }
            })
            .await?;
        if !attached {
            return Ok(None);
        }

        request.status = JoinStatus::Approved;
        let approved = request.clone();
        self.save(&requests).await?;
        Ok(Some(approved))
    }

    /// Reject a pending request. `None` if it is missing or already decided.
    pub async fn reject_join_request(
        &self,
        request_id: &str,
    ) -> Result<Option<JoinRequest>, StoreError> {
        self.mutate(|requests: &mut Vec<JoinRequest>| {
            let request = requests
                .iter_mut()
                .find(|r| r.id == request_id && r.status == JoinStatus::Pending)?;
            request.status = JoinStatus::Rejected;
            Some(request.clone())
        })
        .await
    }

    // ===== Session slot =====

    pub async fn save_session(&self, session: &SessionData) -> Result<(), StoreError> {
        self.write_json(SESSION_SLOT, session).await
    }

    /// The stored session, unless absent or expired
    pub async fn load_session(&self) -> Result<Option<SessionData>, StoreError> {
        let session: Option<SessionData> = self.read_json(SESSION_SLOT).await?;
        Ok(session.filter(|s| !s.is_expired()))
    }

    pub async fn clear_session(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.collection_path(SESSION_SLOT)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(SESSION_SLOT, e)),
        }
    }
}
