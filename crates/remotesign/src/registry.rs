/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! # Task Registry
//!
//! Name-keyed store of signing tasks. Names are unique: since output paths
//! are derived from task names, a duplicate name would mean two tasks
//! writing the same file.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::RegistrationError;
use crate::task::SignTask;

#[derive(Default)]
struct Inner {
    order: Vec<Arc<SignTask>>,
    by_name: HashMap<String, usize>,
}

/// Registered signing tasks, in registration order.
#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task`, rejecting a name that is already taken.
    pub fn register(&self, task: SignTask) -> Result<Arc<SignTask>, RegistrationError> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(task.name()) {
            return Err(RegistrationError::DuplicateTask(task.name().to_string()));
        }

        let task = Arc::new(task);
        let index = inner.order.len();
        inner.by_name.insert(task.name().to_string(), index);
        inner.order.push(task.clone());
        Ok(task)
    }

    /// Registers every task or none of them.
    ///
    /// Fails without registering anything if a name is already taken or
    /// appears twice in `tasks`.
    pub fn register_all(
        &self,
        tasks: Vec<SignTask>,
    ) -> Result<Vec<Arc<SignTask>>, RegistrationError> {
        let mut inner = self.inner.write();

        let mut seen = HashSet::new();
        for task in &tasks {
            if inner.by_name.contains_key(task.name()) || !seen.insert(task.name()) {
                return Err(RegistrationError::DuplicateTask(task.name().to_string()));
            }
        }

        let registered: Vec<Arc<SignTask>> = tasks.into_iter().map(Arc::new).collect();
        for task in &registered {
            let index = inner.order.len();
            inner.by_name.insert(task.name().to_string(), index);
            inner.order.push(task.clone());
        }
        Ok(registered)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<SignTask>> {
        let inner = self.inner.read();
        inner.by_name.get(name).map(|&i| inner.order[i].clone())
    }

    /// All tasks, in registration order.
    pub fn all(&self) -> Vec<Arc<SignTask>> {
        self.inner.read().order.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .order
            .iter()
            .map(|task| task.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}
