//! In-memory stores
//!
//! Used by the test suites and by the server when Postgres cannot be
//! reached at startup. [`MemoryDatabase`] holds users, contacts and
//! preferences together so contact listings can join owner names and user
//! deletion can refuse while contacts still reference the user, matching the
//! schema's `ON DELETE RESTRICT`.

use async_trait::async_trait;
use chrono::Utc;
use cm_core::traits::Id;
use cm_core::Envelope;
use cm_models::{Contact, NewContact, Role, UpdateContact, UpdateUser, User, UserPreferences};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::repository::{
    ContactStore, CreateUserDto, PreferenceStore, RepositoryError, RepositoryResult, UserStore,
};
use crate::rpc::{suggest_username, RpcClient};

#[derive(Default)]
struct State {
    users: BTreeMap<Id, User>,
    contacts: BTreeMap<Id, Contact>,
    preferences: BTreeMap<Id, UserPreferences>,
    next_user_id: Id,
    next_contact_id: Id,
}

impl State {
    fn owner_name(&self, owner_id: Id) -> Option<String> {
        self.users.get(&owner_id).map(|u| u.name.clone())
    }

    fn with_owner(&self, contact: &Contact) -> Contact {
        let mut contact = contact.clone();
        contact.owner_name = self.owner_name(contact.owner_id);
        contact
    }

    fn sorted_contacts<F>(&self, predicate: F) -> Vec<Contact>
    where
        F: Fn(&Contact) -> bool,
    {
        let mut contacts: Vec<_> = self
            .contacts
            .values()
            .filter(|c| predicate(c))
            .map(|c| self.with_owner(c))
            .collect();
        contacts.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        contacts
    }

    fn login_taken(&self, username: &str, email: &str, except: Option<Id>) -> Option<&'static str> {
        self.users
            .values()
            .filter(|u| Some(u.id) != except)
            .find_map(|u| {
                if u.username.eq_ignore_ascii_case(username) {
                    Some("username")
                } else if u.email.eq_ignore_ascii_case(email) {
                    Some("email")
                } else {
                    None
                }
            })
    }
}

/// All stores backed by process memory
pub struct MemoryDatabase {
    state: RwLock<State>,
    available: AtomicBool,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_user_id: 1,
                next_contact_id: 1,
                ..Default::default()
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage; every call fails as unavailable while `false`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable("in-memory database offline".into()))
        }
    }

    /// Insert a contact as-is, keeping its id and timestamps
    pub fn seed_contact(&self, contact: Contact) {
        let mut state = self.state.write();
        state.next_contact_id = state.next_contact_id.max(contact.id + 1);
        state.contacts.insert(contact.id, contact);
    }

    pub fn contact_count(&self) -> usize {
        self.state.read().contacts.len()
    }
}

#[async_trait]
impl UserStore for MemoryDatabase {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<User>> {
        self.check()?;
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.check()?;
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.check()?;
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_login(&self, login: &str) -> RepositoryResult<Option<User>> {
        self.check()?;
        let login = login.trim();
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(login) || u.email.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        self.check()?;
        let mut users: Vec<_> = self.state.read().users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn create(&self, dto: CreateUserDto) -> RepositoryResult<User> {
        self.check()?;
        let mut state = self.state.write();
        if let Some(field) = state.login_taken(&dto.username, &dto.email, None) {
            return Err(RepositoryError::Conflict(format!("{} is already taken", field)));
        }

        let id = state.next_user_id;
        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id,
            name: dto.name,
            email: dto.email,
            username: dto.username,
            role: dto.role,
            employee_number: dto.employee_number,
            position: dto.position,
            avatar: dto.avatar,
            hashed_password: dto.hashed_password,
            must_change_password: dto.must_change_password,
            last_login_on: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Id, changes: &UpdateUser) -> RepositoryResult<User> {
        self.check()?;
        let mut state = self.state.write();
        let mut user = state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("User with id {} not found", id)))?;

        changes.apply_to(&mut user);
        if let Some(field) = state.login_taken(&user.username, &user.email, Some(id)) {
            return Err(RepositoryError::Conflict(format!("{} is already taken", field)));
        }
        user.updated_at = Utc::now();
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        self.check()?;
        let mut state = self.state.write();
        if state.contacts.values().any(|c| c.owner_id == id) {
            return Err(RepositoryError::Conflict(format!(
                "User with id {} still owns contacts",
                id
            )));
        }
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("User with id {} not found", id)))?;
        state.preferences.remove(&id);
        Ok(())
    }

    async fn update_password(
        &self,
        id: Id,
        hashed_password: &str,
        must_change_password: bool,
    ) -> RepositoryResult<()> {
        self.check()?;
        let mut state = self.state.write();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("User with id {} not found", id)))?;
        user.hashed_password = Some(hashed_password.to_string());
        user.must_change_password = must_change_password;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_login(&self, id: Id) -> RepositoryResult<()> {
        self.check()?;
        if let Some(user) = self.state.write().users.get_mut(&id) {
            user.last_login_on = Some(Utc::now());
        }
        Ok(())
    }

    async fn username_exists(&self, username: &str) -> RepositoryResult<bool> {
        self.check()?;
        Ok(self
            .state
            .read()
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(username)))
    }
}

#[async_trait]
impl ContactStore for MemoryDatabase {
    async fn list(&self) -> RepositoryResult<Vec<Contact>> {
        self.check()?;
        Ok(self.state.read().sorted_contacts(|_| true))
    }

    async fn list_by_owner(&self, owner_id: Id) -> RepositoryResult<Vec<Contact>> {
        self.check()?;
        Ok(self.state.read().sorted_contacts(|c| c.owner_id == owner_id))
    }

    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Contact>> {
        self.check()?;
        let state = self.state.read();
        Ok(state.contacts.get(&id).map(|c| state.with_owner(c)))
    }

    async fn create(&self, owner_id: Id, contact: &NewContact) -> RepositoryResult<Contact> {
        self.check()?;
        let mut state = self.state.write();
        if !state.users.contains_key(&owner_id) {
            return Err(RepositoryError::Conflict(format!(
                "Owner with id {} does not exist",
                owner_id
            )));
        }

        let id = state.next_contact_id;
        state.next_contact_id += 1;
        let mut created = contact.clone().into_contact(id, owner_id, None);
        for field in [&mut created.middle_name, &mut created.phone, &mut created.company] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        state.contacts.insert(id, created.clone());
        Ok(state.with_owner(&created))
    }

    async fn update(&self, id: Id, changes: &UpdateContact) -> RepositoryResult<Contact> {
        self.check()?;
        let mut state = self.state.write();
        let contact = state
            .contacts
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Contact with id {} not found", id)))?;
        changes.apply_to(contact);
        let updated = contact.clone();
        Ok(state.with_owner(&updated))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        self.check()?;
        self.state
            .write()
            .contacts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("Contact with id {} not found", id)))
    }

    async fn count_by_owner(&self, owner_id: Id) -> RepositoryResult<usize> {
        self.check()?;
        Ok(self
            .state
            .read()
            .contacts
            .values()
            .filter(|c| c.owner_id == owner_id)
            .count())
    }
}

#[async_trait]
impl PreferenceStore for MemoryDatabase {
    async fn get(&self, user_id: Id) -> RepositoryResult<Option<UserPreferences>> {
        self.check()?;
        Ok(self.state.read().preferences.get(&user_id).cloned())
    }

    async fn save(&self, preferences: &UserPreferences) -> RepositoryResult<UserPreferences> {
        self.check()?;
        let mut saved = preferences.clone();
        saved.updated_at = Utc::now();
        self.state
            .write()
            .preferences
            .insert(saved.user_id, saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl RpcClient for MemoryDatabase {
    async fn get_collaborative_contacts(&self, user_id: Id) -> RepositoryResult<Envelope<Vec<Contact>>> {
        self.check()?;
        let state = self.state.read();
        if !state.users.contains_key(&user_id) {
            return Ok(Envelope::failed("unknown user"));
        }
        Ok(Envelope::ok(state.sorted_contacts(|_| true)))
    }

    async fn get_all_contacts_superadmin(&self, user_id: Id) -> RepositoryResult<Envelope<Vec<Contact>>> {
        self.check()?;
        let state = self.state.read();
        match state.users.get(&user_id) {
            Some(user) if user.role == Role::Superadmin => {
                Ok(Envelope::ok(state.sorted_contacts(|_| true)))
            }
            _ => Ok(Envelope::failed("superadmin role required")),
        }
    }

    async fn get_contacts_filtered(
        &self,
        user_id: Id,
        role: Role,
    ) -> RepositoryResult<Envelope<Vec<Contact>>> {
        self.check()?;
        let state = self.state.read();
        match state.users.get(&user_id) {
            Some(user) if user.role == role => Ok(Envelope::ok(state.sorted_contacts(|_| true))),
            _ => Ok(Envelope::failed("role mismatch")),
        }
    }

    async fn generate_username(&self, name: &str) -> RepositoryResult<Envelope<String>> {
        self.check()?;
        let state = self.state.read();
        let suggestion = suggest_username(name, |candidate| {
            state
                .users
                .values()
                .any(|u| u.username.eq_ignore_ascii_case(candidate))
        });
        Ok(match suggestion {
            Some(username) => Envelope::ok(username),
            None => Envelope::failed("name is required"),
        })
    }

    async fn debug_connection(&self) -> RepositoryResult<Envelope<Value>> {
        self.check()?;
        let state = self.state.read();
        Ok(Envelope::ok(json!({
            "database": "memory",
            "serverTime": Utc::now(),
            "users": state.users.len(),
            "contacts": state.contacts.len(),
        })))
    }
}
