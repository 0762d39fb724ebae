use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;

use crate::registration::{RegistrationStatus, Status};

/// How far the modem has been brought up.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationState {
    PowerDown = 0,
    /// Responding to AT with echo off and full functionality
    Initialized = 1,
    /// Registered, GPRS attached and bearer configured
    Attached = 2,
}

/// Phase of the HTTP(S) session.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpState {
    Disabled,
    Ready,
    /// `AT+HTTPACTION` accepted, waiting for its completion line
    Connecting,
    Reading,
    Error,
}

pub struct State {
    shared: Mutex<NoopRawMutex, RefCell<Shared>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                operation_state: OperationState::PowerDown,
                http_state: HttpState::Disabled,
                use_ssl: false,
                registration: RegistrationStatus::new(),
                state_waker: WakerRegistration::new(),
                http_waker: WakerRegistration::new(),
            })),
        }
    }
}

pub struct Shared {
    operation_state: OperationState,
    http_state: HttpState,
    use_ssl: bool,
    registration: RegistrationStatus,
    state_waker: WakerRegistration,
    http_waker: WakerRegistration,
}

/// Handle onto the observable modem state, shared by the driver and anyone
/// who wants to wait for a transition.
#[derive(Clone)]
pub struct Runner<'d> {
    pub(crate) shared: &'d Mutex<NoopRawMutex, RefCell<Shared>>,
}

impl<'d> Runner<'d> {
    pub fn new(state: &'d State) -> Self {
        Self {
            shared: &state.shared,
        }
    }

    pub fn set_operation_state(&self, state: OperationState) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if s.operation_state != state {
                info!("Operation state {:?} -> {:?}", s.operation_state, state);
            }
            s.operation_state = state;
            s.state_waker.wake();
        });
    }

    pub fn operation_state(&self, cx: Option<&mut Context>) -> OperationState {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if let Some(cx) = cx {
                s.state_waker.register(cx.waker());
            }
            s.operation_state
        })
    }

    pub fn set_http_state(&self, state: HttpState) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if s.http_state != state {
                debug!("HTTP state {:?} -> {:?}", s.http_state, state);
            }
            s.http_state = state;
            s.http_waker.wake();
        });
    }

    pub fn http_state(&self, cx: Option<&mut Context>) -> HttpState {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if let Some(cx) = cx {
                s.http_waker.register(cx.waker());
            }
            s.http_state
        })
    }

    pub fn set_ssl(&self, ssl: bool) {
        self.shared.lock(|s| s.borrow_mut().use_ssl = ssl);
    }

    pub fn ssl(&self) -> bool {
        self.shared.lock(|s| s.borrow().use_ssl)
    }

    pub fn update_registration_with(&self, f: impl FnOnce(&mut RegistrationStatus)) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            f(&mut s.registration);
            s.state_waker.wake();
        })
    }

    pub fn registration_status(&self) -> Status {
        self.shared.lock(|s| s.borrow().registration.get_status())
    }

    pub fn is_registered(&self) -> bool {
        self.shared.lock(|s| s.borrow().registration.registered())
    }

    pub async fn wait_for_operation_state(&self, ps: OperationState) {
        if self.operation_state(None) == ps {
            return;
        }

        poll_fn(|cx| {
            if self.operation_state(Some(cx)) == ps {
                return Poll::Ready(());
            }
            Poll::Pending
        })
        .await
    }

    pub async fn wait_for_http_state(&self, hs: HttpState) {
        if self.http_state(None) == hs {
            return;
        }

        poll_fn(|cx| {
            if self.http_state(Some(cx)) == hs {
                return Poll::Ready(());
            }
            Poll::Pending
        })
        .await
    }

    /// Resolves with the new HTTP state once it differs from the current one.
    pub async fn wait_http_state_change(&self) -> HttpState {
        let old_state = self.http_state(None);

        poll_fn(|cx| {
            let current = self.http_state(Some(cx));
            if current != old_state {
                return Poll::Ready(current);
            }
            Poll::Pending
        })
        .await
    }
}
