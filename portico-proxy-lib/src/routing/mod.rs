pub mod hostname;
pub mod table;

pub use hostname::{dashed_ip, default_hostname, hostname_for, leading_port, strip_port};
pub use table::{Route, RouteTable};
