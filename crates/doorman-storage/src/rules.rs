//! Ordered rule table.
//!
//! Rules are addressed by position. Deleting or inserting shifts the indices
//! of the rules after it, so callers must refetch after a mutation.

use crate::error::{StorageError, StorageResult};
use doorman_core::Rule;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Append a rule and return its index.
    pub fn push(&mut self, rule: Rule) -> usize {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    /// Replace the rule at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `index` is out of range.
    pub fn update(&mut self, index: usize, rule: Rule) -> StorageResult<Rule> {
        let slot = self
            .rules
            .get_mut(index)
            .ok_or_else(|| StorageError::rule_not_found(index))?;
        Ok(std::mem::replace(slot, rule))
    }

    /// Remove the rule at `index`, shifting later rules down.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> StorageResult<Rule> {
        if index >= self.rules.len() {
            return Err(StorageError::rule_not_found(index));
        }
        Ok(self.rules.remove(index))
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for RuleTable {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl From<RuleTable> for Vec<Rule> {
    fn from(table: RuleTable) -> Self {
        table.rules
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
