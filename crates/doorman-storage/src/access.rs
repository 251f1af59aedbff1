//! In-memory access table.
//!
//! A list of authorized users in insertion order. Lookup is a linear scan
//! returning the first user whose tag equals the presented code; duplicate
//! names and duplicate tags are tolerated. Callers persist the table after
//! every mutation.

use doorman_core::AuthorizedUser;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessTable {
    users: Vec<AuthorizedUser>,
}

impl AccessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// First user whose tag equals `code`.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorman_core::AuthorizedUser;
    /// use doorman_storage::AccessTable;
    ///
    /// let mut table = AccessTable::new();
    /// table.insert(AuthorizedUser::new("alice", "12345"));
    ///
    /// assert_eq!(table.lookup("12345").map(|u| u.name.as_str()), Some("alice"));
    /// assert!(table.lookup("99999").is_none());
    /// ```
    pub fn lookup(&self, code: &str) -> Option<&AuthorizedUser> {
        self.users.iter().find(|user| user.matches(code))
    }

    /// Append a user.
    pub fn insert(&mut self, user: AuthorizedUser) {
        self.users.push(user);
    }

    /// Remove every user named `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.users.len();
        self.users.retain(|user| user.name != name);
        before - self.users.len()
    }

    /// Users in insertion order.
    pub fn users(&self) -> &[AuthorizedUser] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

impl From<Vec<AuthorizedUser>> for AccessTable {
    fn from(users: Vec<AuthorizedUser>) -> Self {
        Self { users }
    }
}

impl From<AccessTable> for Vec<AuthorizedUser> {
    fn from(table: AccessTable) -> Self {
        table.users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins_on_duplicate_tags() {
        let mut table = AccessTable::new();
        table.insert(AuthorizedUser::new("alice", "42"));
        table.insert(AuthorizedUser::new("bob", "42"));

        assert_eq!(table.lookup("42").unwrap().name, "alice");
    }

    #[test]
    fn test_lookup_is_textual() {
        let table = AccessTable::from(vec![AuthorizedUser::new("carol", "00123")]);
        assert!(table.lookup("123").is_none());
        assert!(table.lookup("00123").is_some());
    }

    #[test]
    fn test_remove_deletes_all_with_name() {
        let mut table = AccessTable::new();
        table.insert(AuthorizedUser::new("alice", "1"));
        table.insert(AuthorizedUser::new("bob", "2"));
        table.insert(AuthorizedUser::new("alice", "3"));

        assert_eq!(table.remove("alice"), 2);
        assert_eq!(table.users(), &[AuthorizedUser::new("bob", "2")]);
        assert_eq!(table.remove("nobody"), 0);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut table = AccessTable::new();
        for (name, tag) in [("c", "3"), ("a", "1"), ("b", "2")] {
            table.insert(AuthorizedUser::new(name, tag));
        }
        let names: Vec<_> = table.users().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }
}
