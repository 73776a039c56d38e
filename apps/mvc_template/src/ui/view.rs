use std::{
    cell::{Cell, RefCell},
    io::Write,
    rc::Rc,
};

use messenger::{HandlerError, MessageHandler, Messenger};
use shared::{
    domain::ModelField,
    protocol::{topics, Payload, PayloadKind},
};
use tracing::{debug, trace};

use super::commands::{parse_command, ViewCommand, ViewError, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Continue,
    Quit,
}

/// View that publishes button events and prints model values to `W`.
pub struct ConsoleView<W: Write> {
    messenger: Rc<Messenger>,
    out: RefCell<W>,
    visible: Cell<bool>,
    toggled: Cell<bool>,
    variable1: Cell<Option<i64>>,
    variable2: Cell<Option<i64>>,
}

impl<W: Write + 'static> ConsoleView<W> {
    pub fn new(messenger: Rc<Messenger>, out: W) -> Rc<Self> {
        Rc::new(Self {
            messenger,
            out: RefCell::new(out),
            visible: Cell::new(false),
            toggled: Cell::new(false),
            variable1: Cell::new(None),
            variable2: Cell::new(None),
        })
    }

    pub fn init(self: &Rc<Self>) {
        self.messenger
            .subscribe(topics::MODEL_VARIABLE1_CHANGED, self);
        self.messenger
            .subscribe(topics::MODEL_VARIABLE2_CHANGED, self);
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
        debug!(visible, "view visibility changed");
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn is_toggled(&self) -> bool {
        self.toggled.get()
    }

    /// Last value the model announced for `field`.
    pub fn displayed(&self, field: ModelField) -> Option<i64> {
        self.slot(field).get()
    }

    #[cfg(test)]
    pub fn output(&self) -> std::cell::Ref<'_, W> {
        self.out.borrow()
    }

    pub fn handle_input(&self, line: &str) -> Result<InputOutcome, ViewError> {
        let Some(command) = parse_command(line)? else {
            return Ok(InputOutcome::Continue);
        };

        match command {
            ViewCommand::Click => {
                self.messenger.publish(topics::VIEW_BUTTON_CLICK, None)?;
            }
            ViewCommand::Toggle => {
                let toggled = !self.toggled.get();
                self.toggled.set(toggled);
                self.messenger
                    .publish(topics::VIEW_TOGGLE_BUTTON_CLICK, Some(Payload::Bool(toggled)))?;
            }
            ViewCommand::Change(change) => {
                self.messenger
                    .publish(topics::VIEW_CHANGE_BUTTON, Some(Payload::Change(change)))?;
            }
            ViewCommand::Help => {
                writeln!(self.out.borrow_mut(), "{HELP}")?;
            }
            ViewCommand::Quit => return Ok(InputOutcome::Quit),
        }

        Ok(InputOutcome::Continue)
    }

    fn slot(&self, field: ModelField) -> &Cell<Option<i64>> {
        match field {
            ModelField::Variable1 => &self.variable1,
            ModelField::Variable2 => &self.variable2,
        }
    }

    fn render(&self, field: ModelField, value: i64) -> std::io::Result<()> {
        if !self.visible.get() {
            return Ok(());
        }
        writeln!(self.out.borrow_mut(), "{} = {value}", field.as_str())
    }
}

impl<W: Write + 'static> MessageHandler for ConsoleView<W> {
    fn message_handler(&self, topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError> {
        let Some(field) = topics::field_for_changed_topic(topic) else {
            trace!(topic, "view ignoring topic");
            return Ok(());
        };

        let value = Payload::expect_kind(payload, PayloadKind::Int)?
            .as_int()
            .ok_or_else(|| HandlerError::rejected("int payload without value"))?;
        self.slot(field).set(Some(value));
        self.render(field, value)
            .map_err(|err| HandlerError::rejected(format!("view render failed: {err}")))
    }
}
