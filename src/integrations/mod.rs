pub mod solana_rpc;

pub use solana_rpc::HttpRpcConnector;
