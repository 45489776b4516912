pub mod event_slot;
