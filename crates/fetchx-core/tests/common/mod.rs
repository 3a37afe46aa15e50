pub mod backend_server;
