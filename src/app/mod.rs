// Application boundary: ports implemented by infra adapters and test doubles

pub mod ports;
