pub mod http_server;
pub mod mock_llm_client;
