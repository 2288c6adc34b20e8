#![allow(dead_code)]

use std::{
    cell::RefCell,
    os::unix::io::{BorrowedFd, OwnedFd},
    rc::Rc,
};

use wlboot::{
    backend::{BufferId, BufferLayout, Presented, Presenter},
    config::WindowConfig,
    utils::{Rectangle, Size},
    wayland::{
        handshake::{Control, Event, Requests, Sequencer},
        registry::{BindRequest, Global, ShellKind},
    },
    Error,
};

/// Every request the sequencer can issue, as recorded by [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Bind(BindRequest),
    CreateWindow(ShellKind, String),
    Pong(ShellKind, u32),
    AckConfigure(u32),
    Commit,
    Frame,
    Damage(Rectangle),
    CreateBuffers(Vec<BufferLayout>),
    DestroyBuffers,
    Attach(Option<BufferId>),
    DestroyWindow,
}

/// Request sink keeping everything it is asked to send
#[derive(Debug, Default)]
pub struct Recorder {
    pub requests: Vec<Request>,
    /// Duplicated pool fds, to inspect what the client painted
    pub pools: Vec<(OwnedFd, Vec<BufferLayout>)>,
}

impl Recorder {
    pub fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn binds(&self) -> Vec<BindRequest> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                Request::Bind(bind) => Some(*bind),
                _ => None,
            })
            .collect()
    }

    pub fn attached(&self) -> Vec<BufferId> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                Request::Attach(Some(id)) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl Requests for Recorder {
    fn bind(&mut self, request: BindRequest) {
        self.requests.push(Request::Bind(request));
    }

    fn create_window(&mut self, shell: ShellKind, title: &str) -> Result<(), Error> {
        self.requests.push(Request::CreateWindow(shell, title.to_owned()));
        Ok(())
    }

    fn pong(&mut self, source: ShellKind, serial: u32) {
        self.requests.push(Request::Pong(source, serial));
    }

    fn ack_configure(&mut self, serial: u32) {
        self.requests.push(Request::AckConfigure(serial));
    }

    fn commit(&mut self) {
        self.requests.push(Request::Commit);
    }

    fn frame(&mut self) {
        self.requests.push(Request::Frame);
    }

    fn damage(&mut self, damage: Rectangle) {
        self.requests.push(Request::Damage(damage));
    }

    fn create_buffers(
        &mut self,
        fd: BorrowedFd<'_>,
        _pool_size: usize,
        buffers: &[BufferLayout],
    ) -> Result<(), Error> {
        self.pools.push((fd.try_clone_to_owned()?, buffers.to_vec()));
        self.requests.push(Request::CreateBuffers(buffers.to_vec()));
        Ok(())
    }

    fn destroy_buffers(&mut self) {
        self.requests.push(Request::DestroyBuffers);
    }

    fn attach(&mut self, buffer: Option<BufferId>) {
        self.requests.push(Request::Attach(buffer));
    }

    fn destroy_window(&mut self) {
        self.requests.push(Request::DestroyWindow);
    }
}

/// Calls received by [`MockPresenter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Init(Size),
    Resize(Size),
    Present,
    Release(BufferId),
    Finish,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Presenter logging its calls, presenting like a backend would: frame, then commit
#[derive(Debug)]
pub struct MockPresenter {
    log: CallLog,
    skip: Rc<RefCell<bool>>,
}

impl MockPresenter {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        (
            MockPresenter {
                log: log.clone(),
                skip: Rc::default(),
            },
            log,
        )
    }

    /// Returns a switch making `present` report [`Presented::Skipped`] while set
    pub fn skip_switch(&self) -> Rc<RefCell<bool>> {
        self.skip.clone()
    }
}

impl Presenter for MockPresenter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn init(&mut self, size: Size, _requests: &mut dyn Requests) -> Result<(), Error> {
        self.log.borrow_mut().push(Call::Init(size));
        Ok(())
    }

    fn resize(&mut self, size: Size, _requests: &mut dyn Requests) -> Result<(), Error> {
        self.log.borrow_mut().push(Call::Resize(size));
        Ok(())
    }

    fn present(&mut self, requests: &mut dyn Requests) -> Result<Presented, Error> {
        if *self.skip.borrow() {
            return Ok(Presented::Skipped);
        }
        self.log.borrow_mut().push(Call::Present);
        requests.frame();
        requests.commit();
        Ok(Presented::Frame)
    }

    fn release(&mut self, buffer: BufferId) {
        self.log.borrow_mut().push(Call::Release(buffer));
    }

    fn finish(&mut self, requests: &mut dyn Requests) {
        self.log.borrow_mut().push(Call::Finish);
        requests.destroy_buffers();
    }
}

pub fn globals(list: &[(u32, &str, u32)]) -> Vec<Event> {
    list.iter()
        .map(|(name, interface, version)| Event::Global(Global::new(*name, *interface, *version)))
        .collect()
}

/// Feed events to the sequencer, failing the test on the first error
pub fn feed(sequencer: &mut Sequencer, recorder: &mut Recorder, events: Vec<Event>) -> Vec<Control> {
    events
        .into_iter()
        .map(|event| sequencer.handle(event, recorder).expect("event handling failed"))
        .collect()
}

/// Sequencer past `create_window` on an xdg compositor
pub fn xdg_window(config: WindowConfig) -> (Sequencer, Recorder) {
    let mut sequencer = Sequencer::new(config);
    let mut recorder = Recorder::default();
    feed(
        &mut sequencer,
        &mut recorder,
        globals(&[(1, "wl_compositor", 5), (2, "xdg_wm_base", 3), (3, "wl_shm", 1)]),
    );
    sequencer.finish_registry().expect("registry incomplete");
    sequencer.create_window(&mut recorder).expect("window creation failed");
    (sequencer, recorder)
}
