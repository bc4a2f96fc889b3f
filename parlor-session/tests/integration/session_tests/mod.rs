pub mod test_join_and_bridge;
pub mod test_leave_semantics;
pub mod test_offer_initiation;
