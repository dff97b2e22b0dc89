pub mod event_loop;
pub mod inbound;
pub mod outbound;
pub mod promise;
