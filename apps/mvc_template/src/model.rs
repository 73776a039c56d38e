//! Application state. Reacts to controller change requests and announces new values.

use std::{cell::Cell, rc::Rc};

use messenger::{DispatchError, HandlerError, MessageHandler, Messenger};
use shared::{
    domain::ModelField,
    protocol::{topics, ChangeRequest, Payload, PayloadKind},
};
use tracing::{debug, trace};

pub struct Model {
    messenger: Rc<Messenger>,
    variable1: Cell<i64>,
    variable2: Cell<i64>,
}

impl Model {
    pub fn new(messenger: Rc<Messenger>, variable1: i64, variable2: i64) -> Rc<Self> {
        Rc::new(Self {
            messenger,
            variable1: Cell::new(variable1),
            variable2: Cell::new(variable2),
        })
    }

    /// Subscribes to change requests and announces the starting values.
    pub fn init(self: &Rc<Self>) -> Result<(), DispatchError> {
        self.messenger
            .subscribe(topics::CONTROLLER_CHANGE_BUTTON, self);
        self.announce(ModelField::Variable1)?;
        self.announce(ModelField::Variable2)?;
        Ok(())
    }

    pub fn value(&self, field: ModelField) -> i64 {
        self.cell(field).get()
    }

    pub fn apply(&self, change: ChangeRequest) -> i64 {
        let cell = self.cell(change.field);
        let next = cell.get().saturating_add(change.direction.delta());
        cell.set(next);
        debug!(field = change.field.as_str(), value = next, "model updated");
        next
    }

    fn cell(&self, field: ModelField) -> &Cell<i64> {
        match field {
            ModelField::Variable1 => &self.variable1,
            ModelField::Variable2 => &self.variable2,
        }
    }

    fn announce(&self, field: ModelField) -> Result<(), DispatchError> {
        self.messenger
            .publish(topics::changed_topic(field), Some(Payload::Int(self.value(field))))?;
        Ok(())
    }
}

impl MessageHandler for Model {
    fn message_handler(&self, topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError> {
        if topic != topics::CONTROLLER_CHANGE_BUTTON {
            trace!(topic, "model ignoring topic");
            return Ok(());
        }

        let change = Payload::expect_kind(payload, PayloadKind::Change)?
            .as_change()
            .ok_or_else(|| HandlerError::rejected("change payload without change request"))?;
        self.apply(change);
        self.announce(change.field)?;
        Ok(())
    }
}
