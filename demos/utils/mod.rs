mod esplora;

pub use esplora::EsploraClient;
