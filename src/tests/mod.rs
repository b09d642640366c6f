mod market_data_tests;
mod tool_tests;
