//! Scripted widget used by the session tests.
//!
//! Records creations, disposals and commands, and lets a test emit events
//! through any widget it has built.

use std::sync::{Arc, Mutex, MutexGuard};

use super::widget::{
    EventKind, EventSink, ListenerSet, RtcWidget, Subscription, Surface, WidgetCommand,
    WidgetError, WidgetEvent, WidgetFactory, WidgetParams,
};

#[derive(Default)]
pub struct FakeLog {
    pub created: usize,
    pub disposed: usize,
    pub max_live: usize,
    pub commands: Vec<WidgetCommand>,
    pub params: Vec<WidgetParams>,
    pub fail_next: Option<WidgetError>,
}

impl FakeLog {
    pub fn live(&self) -> usize {
        self.created - self.disposed
    }
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    log: Arc<Mutex<FakeLog>>,
    widgets: Arc<Mutex<Vec<ListenerSet>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, FakeLog> {
        self.log.lock().unwrap()
    }

    pub fn fail_next(&self, err: WidgetError) {
        self.log().fail_next = Some(err);
    }

    /// Emit through the n-th widget built (0-based).
    pub fn emit(&self, widget: usize, event: WidgetEvent) -> usize {
        let listeners = self.widgets.lock().unwrap()[widget].clone();
        listeners.emit(&event)
    }

    pub fn emit_latest(&self, event: WidgetEvent) -> usize {
        let listeners = self
            .widgets
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no widget built yet");
        listeners.emit(&event)
    }
}

impl WidgetFactory for FakeFactory {
    fn create(
        &mut self,
        params: &WidgetParams,
        surface: Surface,
    ) -> Result<Box<dyn RtcWidget>, WidgetError> {
        let mut log = self.log();
        if let Some(err) = log.fail_next.take() {
            return Err(err);
        }
        log.created += 1;
        log.max_live = log.max_live.max(log.live());
        log.params.push(params.clone());

        let listeners = ListenerSet::new();
        self.widgets.lock().unwrap().push(listeners.clone());
        surface.write_line(format!("fake call in {}", params.room_name));

        Ok(Box::new(FakeWidget {
            log: Arc::clone(&self.log),
            listeners,
            disposed: false,
        }))
    }
}

struct FakeWidget {
    log: Arc<Mutex<FakeLog>>,
    listeners: ListenerSet,
    disposed: bool,
}

impl RtcWidget for FakeWidget {
    fn subscribe(&mut self, kind: EventKind, sink: EventSink) -> Subscription {
        self.listeners.register(kind, sink)
    }

    fn execute(&mut self, command: WidgetCommand) {
        self.log.lock().unwrap().commands.push(command);
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.log.lock().unwrap().disposed += 1;
            self.listeners.clear();
        }
    }
}
