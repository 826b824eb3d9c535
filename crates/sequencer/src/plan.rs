//! Provisioning plan - the fixed ordered list of steps for one run

use crate::resource::BoxedResource;
use crate::types::Criticality;

/// What a step does when it runs
#[derive(Debug)]
pub enum StepBody {
    /// Converge these resources in order
    Resources(Vec<BoxedResource>),
    /// Do not run; record a warning with this reason
    Skip { reason: String },
    /// A precondition is missing: fails a fatal step, skips a recoverable one
    Unavailable { reason: String },
}

/// A named provisioning step
#[derive(Debug)]
pub struct Step {
    pub name: String,
    pub description: String,
    pub criticality: Criticality,
    pub body: StepBody,
}

impl Step {
    /// Create an empty step
    pub fn new(name: &str, description: &str, criticality: Criticality) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            criticality,
            body: StepBody::Resources(Vec::new()),
        }
    }

    /// Create a step that will be skipped with a warning
    pub fn skip(name: &str, description: &str, criticality: Criticality, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            criticality,
            body: StepBody::Skip {
                reason: reason.to_string(),
            },
        }
    }

    /// Create a step whose precondition is not met
    ///
    /// A fatal step fails with `reason`; a recoverable one is skipped.
    pub fn unavailable(
        name: &str,
        description: &str,
        criticality: Criticality,
        reason: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            criticality,
            body: StepBody::Unavailable {
                reason: reason.to_string(),
            },
        }
    }

    /// Add a resource (no-op on a skipped step)
    pub fn with_resource(mut self, resource: BoxedResource) -> Self {
        self.push(resource);
        self
    }

    /// Add several resources
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = BoxedResource>) -> Self {
        for resource in resources {
            self.push(resource);
        }
        self
    }

    /// Add a resource in place
    pub fn push(&mut self, resource: BoxedResource) {
        if let StepBody::Resources(resources) = &mut self.body {
            resources.push(resource);
        }
    }

    /// Number of resources in the step
    pub fn len(&self) -> usize {
        match &self.body {
            StepBody::Resources(r) => r.len(),
            StepBody::Skip { .. } | StepBody::Unavailable { .. } => 0,
        }
    }

    /// Check if the step has no resources
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered list of steps
#[derive(Debug, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Plan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Step names in order
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Keep only the selected steps
    ///
    /// `only` wins over `skip`. Order is preserved.
    pub fn select(self, only: Option<&[String]>, skip: Option<&[String]>) -> Self {
        let steps = self
            .steps
            .into_iter()
            .filter(|s| match (only, skip) {
                (Some(only), _) => only.iter().any(|n| n == &s.name),
                (None, Some(skip)) => !skip.iter().any(|n| n == &s.name),
                (None, None) => true,
            })
            .collect();
        Self { steps }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.steps.iter().map(Step::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        let mut plan = Plan::new();
        plan.push(Step::new("upgrade", "", Criticality::Recoverable));
        plan.push(Step::new("packages", "", Criticality::Fatal));
        plan.push(Step::skip("desktop", "", Criticality::Recoverable, "no session"));
        plan
    }

    #[test]
    fn test_select_only() {
        let only = vec!["desktop".to_string(), "upgrade".to_string()];
        let plan = plan().select(Some(&only), None);
        assert_eq!(plan.names(), vec!["upgrade", "desktop"]);
    }

    #[test]
    fn test_select_skip() {
        let skip = vec!["packages".to_string()];
        let plan = plan().select(None, Some(&skip));
        assert_eq!(plan.names(), vec!["upgrade", "desktop"]);
    }

    #[test]
    fn test_skip_step_ignores_resources() {
        #[derive(Debug)]
        struct Dummy;
        impl crate::Resource for Dummy {
            fn id(&self) -> String {
                "dummy".into()
            }
            fn description(&self) -> String {
                String::new()
            }
            fn resource_type(&self) -> &'static str {
                "dummy"
            }
            fn current_state(&self) -> anyhow::Result<crate::ResourceState> {
                Ok(crate::ResourceState::Absent)
            }
            fn desired_state(&self) -> crate::ResourceState {
                crate::ResourceState::Absent
            }
            fn apply(
                &self,
                _ctx: &mut crate::ApplyContext,
            ) -> anyhow::Result<crate::ApplyResult> {
                Ok(crate::ApplyResult::NoChange)
            }
        }

        let step = Step::skip("x", "", Criticality::Recoverable, "off").with_resource(Box::new(Dummy));
        assert!(step.is_empty());
        let step = Step::new("y", "", Criticality::Recoverable).with_resource(Box::new(Dummy));
        assert_eq!(step.len(), 1);
    }
}
