//! In-memory stack provider that records every call.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::api::CloudFormationApi;
use super::parameters::StackOutputs;
use super::types::{StackDescription, StackRequest, StackStatus};
use crate::error::{Result, StackError};

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(StackRequest),
    Update(StackRequest),
    Delete(String),
}

impl Call {
    pub fn label(&self) -> String {
        match self {
            Self::Create(req) => format!("create:{}", req.name),
            Self::Update(req) => format!("update:{}", req.name),
            Self::Delete(name) => format!("delete:{name}"),
        }
    }
}

#[derive(Default)]
struct State {
    stacks: BTreeMap<String, StackDescription>,
    calls: Vec<Call>,
    create_outputs: BTreeMap<String, StackOutputs>,
    update_outputs: BTreeMap<String, StackOutputs>,
    nested: BTreeMap<String, (String, StackOutputs)>,
    failing: BTreeSet<String>,
}

/// Stacks settle instantly; outputs are scripted per stack name.
#[derive(Default)]
pub struct FakeCloudFormation {
    state: Mutex<State>,
}

fn stack_id(name: &str) -> String {
    format!("arn:aws:cloudformation:us-east-2:123456789012:stack/{name}/1")
}

impl FakeCloudFormation {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(&self, f: impl FnOnce(&mut State)) {
        f(&mut self.state.lock().expect("fake state"));
    }

    /// Outputs a stack reports once created.
    pub fn on_create(&self, name: &str, outputs: &[(&str, &str)]) {
        self.with_state(|s| {
            s.create_outputs
                .insert(name.to_string(), outputs.iter().copied().collect());
        });
    }

    /// Outputs added to a stack by an update.
    pub fn on_update(&self, name: &str, outputs: &[(&str, &str)]) {
        self.with_state(|s| {
            s.update_outputs
                .insert(name.to_string(), outputs.iter().copied().collect());
        });
    }

    /// A child stack that appears when `parent` is updated.
    pub fn nested_on_update(&self, parent: &str, child: &str, outputs: &[(&str, &str)]) {
        self.with_state(|s| {
            s.nested.insert(
                parent.to_string(),
                (child.to_string(), outputs.iter().copied().collect()),
            );
        });
    }

    /// Makes the next create or update of `name` roll back.
    pub fn fail(&self, name: &str) {
        self.with_state(|s| {
            s.failing.insert(name.to_string());
        });
    }

    /// Puts a settled stack in place without recording a call.
    pub fn seed(&self, name: &str, outputs: &[(&str, &str)]) {
        self.with_state(|s| {
            s.stacks.insert(
                name.to_string(),
                StackDescription {
                    name: name.to_string(),
                    stack_id: stack_id(name),
                    status: StackStatus::CreateComplete,
                    status_reason: None,
                    outputs: outputs.iter().copied().collect(),
                },
            );
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().expect("fake state").calls.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(Call::label).collect()
    }

    pub fn stack_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("fake state")
            .stacks
            .keys()
            .cloned()
            .collect()
    }

    pub fn last_update(&self, name: &str) -> Option<StackRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Update(req) if req.name == name => Some(req),
            _ => None,
        })
    }

    pub fn first_create(&self, name: &str) -> Option<StackRequest> {
        self.calls().into_iter().find_map(|call| match call {
            Call::Create(req) if req.name == name => Some(req),
            _ => None,
        })
    }
}

#[async_trait]
impl CloudFormationApi for FakeCloudFormation {
    async fn submit_create(&self, request: &StackRequest) -> Result<String> {
        let mut s = self.state.lock().expect("fake state");
        s.calls.push(Call::Create(request.clone()));
        if s.stacks.contains_key(&request.name) {
            return Err(StackError::rejected(&request.name, "create", "stack already exists").into());
        }

        let failing = s.failing.remove(&request.name);
        let outputs = s.create_outputs.get(&request.name).cloned().unwrap_or_default();
        s.stacks.insert(
            request.name.clone(),
            StackDescription {
                name: request.name.clone(),
                stack_id: stack_id(&request.name),
                status: if failing {
                    StackStatus::RollbackComplete
                } else {
                    StackStatus::CreateComplete
                },
                status_reason: failing.then(|| String::from("The following resource(s) failed to create")),
                outputs: if failing { StackOutputs::new() } else { outputs },
            },
        );
        Ok(stack_id(&request.name))
    }

    async fn submit_update(&self, request: &StackRequest) -> Result<Option<String>> {
        let mut s = self.state.lock().expect("fake state");
        s.calls.push(Call::Update(request.clone()));

        let failing = s.failing.remove(&request.name);
        let extra = s.update_outputs.get(&request.name).cloned().unwrap_or_default();
        let nested = s.nested.get(&request.name).cloned();

        let Some(stack) = s.stacks.get_mut(&request.name) else {
            return Err(StackError::rejected(&request.name, "update", "stack does not exist").into());
        };
        if failing {
            stack.status = StackStatus::UpdateRollbackComplete;
            stack.status_reason = Some(String::from("The following resource(s) failed to update"));
            return Ok(Some(stack.stack_id.clone()));
        }
        stack.status = StackStatus::UpdateComplete;
        for (key, value) in extra.iter() {
            stack.outputs.insert(key, value);
        }
        let id = stack.stack_id.clone();

        if let Some((child, outputs)) = nested {
            s.stacks.entry(child.clone()).or_insert(StackDescription {
                name: child.clone(),
                stack_id: stack_id(&child),
                status: StackStatus::CreateComplete,
                status_reason: None,
                outputs,
            });
        }
        Ok(Some(id))
    }

    async fn submit_delete(&self, stack_name: &str) -> Result<()> {
        let mut s = self.state.lock().expect("fake state");
        s.calls.push(Call::Delete(stack_name.to_string()));
        s.stacks.remove(stack_name);
        if let Some((child, _)) = s.nested.get(stack_name).cloned() {
            s.stacks.remove(&child);
        }
        Ok(())
    }

    async fn describe(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        Ok(self
            .state
            .lock()
            .expect("fake state")
            .stacks
            .get(stack_name)
            .cloned())
    }
}
