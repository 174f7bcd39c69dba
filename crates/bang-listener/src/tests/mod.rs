//! Test suites for the queue listener.

mod dispatch_behaviour;
mod support;
