//! Input and output dispatch between the transport and subscribers.

mod input;
mod output;
