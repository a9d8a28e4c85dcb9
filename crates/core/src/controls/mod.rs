use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::{Result, WhitneyError};

/// Identifier of an externally owned input control.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlId(String);

impl ControlId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Receives the lock/unlock signal for controls disabled during export.
pub trait ControlPanel {
    fn set_enabled(&mut self, control: &ControlId, enabled: bool);
}

/// Control panel shared between the host and the export driver.
pub type SharedControls = Rc<RefCell<dyn ControlPanel>>;

/// Simple control panel tracking the enabled flag per control.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    enabled: BTreeMap<ControlId, bool>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown controls are treated as enabled.
    pub fn is_enabled(&self, control: &ControlId) -> bool {
        self.enabled.get(control).copied().unwrap_or(true)
    }

    pub fn disabled(&self) -> Vec<ControlId> {
        self.enabled
            .iter()
            .filter(|(_, enabled)| !**enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl ControlPanel for ControlRegistry {
    fn set_enabled(&mut self, control: &ControlId, enabled: bool) {
        self.enabled.insert(control.clone(), enabled);
    }
}

/// Disables a set of controls for as long as the lock is alive.
pub(crate) struct ControlLock {
    controls: SharedControls,
    ids: Vec<ControlId>,
}

impl ControlLock {
    /// Fails without touching any control when the panel is already
    /// borrowed.
    pub(crate) fn engage(controls: SharedControls, ids: Vec<ControlId>) -> Result<Self> {
        {
            let mut panel = controls
                .try_borrow_mut()
                .map_err(|_| WhitneyError::ControlsBusy)?;
            for id in &ids {
                panel.set_enabled(id, false);
            }
        }
        Ok(Self { controls, ids })
    }
}

impl Drop for ControlLock {
    fn drop(&mut self) {
        match self.controls.try_borrow_mut() {
            Ok(mut panel) => {
                for id in &self.ids {
                    panel.set_enabled(id, true);
                }
            }
            Err(_) => tracing::error!(
                controls = self.ids.len(),
                "control panel busy, locked controls were not re-enabled"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_disables_until_dropped() {
        let registry = Rc::new(RefCell::new(ControlRegistry::new()));
        let play = ControlId::from("playPause");
        let duration = ControlId::from("duration");

        let lock =
            ControlLock::engage(registry.clone(), vec![play.clone(), duration.clone()]).unwrap();
        assert!(!registry.borrow().is_enabled(&play));
        assert_eq!(registry.borrow().disabled(), vec![duration.clone(), play.clone()]);

        drop(lock);
        assert!(registry.borrow().is_enabled(&play));
        assert!(registry.borrow().is_enabled(&duration));
        assert!(registry.borrow().disabled().is_empty());
    }

    #[test]
    fn engage_fails_while_panel_is_borrowed() {
        let registry = Rc::new(RefCell::new(ControlRegistry::new()));
        let held = registry.borrow();

        let result = ControlLock::engage(registry.clone(), vec![ControlId::from("duration")]);
        assert!(matches!(result, Err(WhitneyError::ControlsBusy)));
        drop(held);
        assert!(registry.borrow().disabled().is_empty());
    }
}
