use std::cell::RefCell;
use std::rc::Rc;

pub const IDLE_MESSAGE: &str = "preparing print content...";

/// Observable preparation state of the print coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintStatus {
    pub preparing: bool,
    pub message: String,
}

impl Default for PrintStatus {
    fn default() -> Self {
        Self {
            preparing: false,
            message: IDLE_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Rc<RefCell<PrintStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PrintStatus {
        self.inner.borrow().clone()
    }

    pub fn begin(&self, message: impl Into<String>) {
        let mut status = self.inner.borrow_mut();
        status.preparing = true;
        status.message = message.into();
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.inner.borrow_mut().message = message.into();
    }

    pub fn reset(&self) {
        *self.inner.borrow_mut() = PrintStatus::default();
    }
}
