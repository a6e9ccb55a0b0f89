// Test module organization
pub mod test_advanced_calls;
pub mod test_api_proposals;
pub mod test_basic;
pub mod test_c_functions;
pub mod test_closures;
pub mod test_functions;
pub mod test_gc_metamethods;
pub mod test_io; // IO tests use test_data directory
pub mod test_math;
pub mod test_operators;
pub mod test_os; // OS library tests
pub mod test_package;
pub mod test_rclosure;
pub mod test_string;
pub mod test_syntax;
pub mod test_table;
pub mod test_user_api;
pub mod test_userdata;
pub mod test_xpcall_debug;
