//! # Módulo de Transferencias
//!
//! Todo lo que mueve bytes entre la red y el storage root:
//!
//! - `events`: la superficie de observación (callbacks de progreso y de
//!   inicio/fin por archivo)
//! - `upload`: recepción de partes multipart hacia disco
//! - `download`: streaming de un archivo hacia la conexión
//!
//! El invariante compartido: por cada archivo transferido en un request
//! se emite exactamente un `Started` seguido de exactamente un
//! `Completed`, pase lo que pase con la conexión.

pub mod download;
pub mod events;
pub mod upload;

// Re-exportar para facilitar el uso
pub use download::DownloadStreamer;
pub use events::{
    EventSender, LogObserver, NullObserver, StatusObserver, TransferEvent, TransferKind,
    TransferPhase,
};
pub use upload::{ProgressReader, UploadError, UploadSink, UploadSummary};
