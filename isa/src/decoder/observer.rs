//! Observer interface of the decoder.
//!
//! Observers are owned outside the decoder and shared with it through
//! [`SharedObserver`]. A [`Dispatcher`] turns the single `visit` callback
//! into per-category handlers.

use std::cell::RefCell;
use std::rc::Rc;

use super::category::{Category, Isa};
use super::instruction::Instruction;

pub trait DecoderObserver {
    fn visit(&mut self, instruction: &Instruction);

    /// Called on every instruction-set switch, and once on registration.
    fn set_isa(&mut self, isa: Isa) {
        let _ = isa;
    }
}

pub type SharedObserver = Rc<RefCell<dyn DecoderObserver>>;

/// Identity of a registered observer, independent of the pointee type.
pub(crate) fn same_observer<T: ?Sized>(registered: &SharedObserver, other: &Rc<RefCell<T>>) -> bool {
    Rc::as_ptr(registered).cast::<()>() == Rc::as_ptr(other).cast::<()>()
}

type Handler = Box<dyn FnMut(&Instruction)>;

/// Category-indexed handler table. Categories without a handler go to the
/// `on_unhandled` hook, or are ignored when there is none.
pub struct Dispatcher {
    handlers: Vec<Option<Handler>>,
    unhandled: Option<Handler>,
    isa: Isa,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            handlers: std::iter::repeat_with(|| None).take(Category::COUNT).collect(),
            unhandled: None,
            isa: Isa::default(),
        }
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handler of `category`, replacing any previous one.
    #[must_use]
    pub fn on(mut self, category: Category, handler: impl FnMut(&Instruction) + 'static) -> Self {
        self.handlers[category.index()] = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_unhandled(mut self, handler: impl FnMut(&Instruction) + 'static) -> Self {
        self.unhandled = Some(Box::new(handler));
        self
    }

    /// Last instruction set the decoder reported.
    #[must_use]
    pub const fn isa(&self) -> Isa {
        self.isa
    }
}

impl DecoderObserver for Dispatcher {
    fn visit(&mut self, instruction: &Instruction) {
        match &mut self.handlers[instruction.category.index()] {
            Some(handler) => handler(instruction),
            None => {
                if let Some(unhandled) = &mut self.unhandled {
                    unhandled(instruction);
                }
            }
        }
    }

    fn set_isa(&mut self, isa: Isa) {
        self.isa = isa;
    }
}
