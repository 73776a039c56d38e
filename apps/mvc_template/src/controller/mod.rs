//! Controller layer: builds the messenger, view and model, logs received messages
//! and forwards view requests to the model.

pub mod events;
pub mod orchestration;

use std::{
    cell::RefCell,
    collections::VecDeque,
    io::Write,
    rc::Rc,
};

use messenger::{DispatchError, HandlerError, MessageHandler, Messenger};
use shared::protocol::Payload;
use tracing::info;

use crate::{config::Settings, model::Model, ui::ConsoleView};

pub struct Controller<W: Write + 'static> {
    messenger: Rc<Messenger>,
    view: Rc<ConsoleView<W>>,
    model: Rc<Model>,
    topics: Vec<String>,
    history: RefCell<VecDeque<String>>,
    history_limit: usize,
}

impl<W: Write + 'static> Controller<W> {
    /// Creates the messenger, then the view (made visible) and the model, handing
    /// the same messenger to both.
    pub fn new(settings: &Settings, output: W) -> Result<Rc<Self>, DispatchError> {
        let messenger = Rc::new(Messenger::with_options(settings.dispatch_options()));

        let view = ConsoleView::new(messenger.clone(), output);
        view.init();
        view.set_visible(true);

        let model = Model::new(
            messenger.clone(),
            settings.initial_variable1,
            settings.initial_variable2,
        );
        model.init()?;

        Ok(Rc::new(Self {
            messenger,
            view,
            model,
            topics: settings.controller_topics.clone(),
            history: RefCell::new(VecDeque::new()),
            history_limit: settings.history_limit,
        }))
    }

    /// Subscribes the controller to every configured topic.
    pub fn init(self: &Rc<Self>) {
        for topic in &self.topics {
            self.messenger.subscribe(topic, self);
        }
        info!(topics = self.topics.len(), "controller initialized");
    }

    pub fn messenger(&self) -> &Rc<Messenger> {
        &self.messenger
    }

    pub fn view(&self) -> &Rc<ConsoleView<W>> {
        &self.view
    }

    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    /// Most recent log lines, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().iter().cloned().collect()
    }

    fn remember(&self, line: String) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.borrow_mut();
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(line);
    }
}

impl<W: Write + 'static> MessageHandler for Controller<W> {
    fn message_handler(&self, topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError> {
        let line = events::received_line(topic, payload);
        info!(topic, sender = events::sender_label(topic), "{line}");
        self.remember(line);

        if let Some(follow_up) = orchestration::route(topic, payload)? {
            orchestration::dispatch_follow_up(&self.messenger, follow_up)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;
