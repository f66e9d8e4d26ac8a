//! Backup artifact producers

pub mod pg_producer;

pub use pg_producer::PgArtifactProducer;
