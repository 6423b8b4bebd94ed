//! # Router de Requests
//!
//! Este módulo es el punto de entrada a nivel HTTP: clasifica cada
//! request y lo despacha al camino correspondiente.
//!
//! ## Orden de clasificación
//!
//! ```text
//! POST + Content-Type multipart/form-data → upload (requiere boundary)
//! GET                                     → navegación / descarga
//! cualquier otra cosa                     → "Success!" (default permisivo)
//! ```
//!
//! ## Política de errores
//!
//! Todos los errores por-request se convierten acá en un body de texto
//! fijo con **status 200**: la herramienta original nunca señala fallas
//! con códigos HTTP y los clientes existentes dependen de eso. El costo
//! es conocido: un cliente genérico no puede distinguir éxito de error
//! sin mirar el body. Devolver 4xx/5xx reales sería una mejora
//! incompatible y queda documentada como desviación posible, no aplicada.

use crate::http::{Method, Request, Response};
use crate::multipart::MultipartParser;
use crate::storage::{self, PathResolver, ResolveError};
use crate::transfer::{DownloadStreamer, ProgressReader, StatusObserver, UploadSink};
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

/// Mensajes fijos heredados de la herramienta original
const MSG_SUCCESS: &str = "Success!";
const MSG_UPLOAD_ERROR: &str = "Error uploading file!";
const MSG_NO_SUCH_PATH: &str = "Error! No such file or directory";
const MSG_DOWNLOAD_ERROR: &str = "Error downloading file!";
const MSG_LISTING_ERROR: &str = "Error listing directory!";

/// Router que despacha requests a upload, listado o descarga
pub struct Router {
    /// Resolución de paths confinada al storage root
    resolver: PathResolver,

    /// Observer de transferencias inyectado en la construcción
    observer: Arc<dyn StatusObserver>,
}

impl Router {
    /// Crea un router sobre el resolver y el observer dados
    pub fn new(resolver: PathResolver, observer: Arc<dyn StatusObserver>) -> Self {
        Self { resolver, observer }
    }

    /// Maneja un request completo y escribe la respuesta en `out`
    ///
    /// `body` es el stream de la conexión posicionado justo después de la
    /// cabecera del request. Las descargas escriben directo en `out`
    /// (streaming); el resto sale como respuesta fija.
    ///
    /// Retorna `Err` solo ante fallas de I/O con la conexión misma (un
    /// cliente desconectado, por ejemplo); los errores de aplicación ya
    /// salieron como body de texto.
    pub fn handle<R: BufRead, W: Write>(
        &self,
        request: &Request,
        body: &mut R,
        out: &mut W,
    ) -> io::Result<()> {
        let reply = if request.method() == Method::POST && Self::is_multipart(request) {
            match Self::boundary_param(request) {
                Some(boundary) if !boundary.is_empty() => {
                    Some(self.handle_upload(request, body, &boundary))
                }
                // Content-Type multipart sin boundary: request malformado
                _ => {
                    println!("   ❌ Multipart sin boundary");
                    Some(Response::text(MSG_UPLOAD_ERROR))
                }
            }
        } else if request.method() == Method::GET {
            self.handle_get(request, out)?
        } else {
            // Default permisivo heredado: cualquier otro método "funciona"
            Some(Response::text(MSG_SUCCESS))
        };

        if let Some(mut response) = reply {
            self.add_common_headers(&mut response);
            out.write_all(&response.to_bytes())?;
            out.flush()?;
        }

        Ok(())
    }

    /// Camino de upload: multipart → sink → disco
    fn handle_upload<R: BufRead>(
        &self,
        request: &Request,
        body: &mut R,
        boundary: &str,
    ) -> Response {
        let observer = self.observer.as_ref();
        let sink = UploadSink::new(self.resolver.root(), observer);

        // El body se limita al Content-Length declarado; si lo hay,
        // también alimenta el cálculo de progreso
        let result = match request.content_length() {
            Some(length) => {
                let limited = body.take(length);
                let counted = ProgressReader::new(limited, length, observer);
                let mut parser = MultipartParser::new(counted, boundary);
                sink.receive(&mut parser)
            }
            None => {
                // Sin Content-Length: se lee hasta EOF, sin progreso
                let mut parser = MultipartParser::new(&mut *body, boundary);
                sink.receive(&mut parser)
            }
        };

        match result {
            Ok(summary) => {
                println!(
                    "   ✅ Upload: {} archivo(s), {} campo(s)",
                    summary.saved_files.len(),
                    summary.fields.len()
                );
                Response::text(MSG_SUCCESS)
            }
            Err(e) => {
                println!("   ❌ Upload falló: {}", e);
                Response::text(MSG_UPLOAD_ERROR)
            }
        }
    }

    /// Camino de navegación/descarga
    ///
    /// Retorna `Ok(None)` si la descarga ya se escribió en streaming.
    fn handle_get<W: Write>(
        &self,
        request: &Request,
        out: &mut W,
    ) -> io::Result<Option<Response>> {
        let resolved = match self.resolver.resolve(request.path()) {
            Ok(path) => path,
            Err(ResolveError::NotFound(p)) => {
                println!("   ❌ No existe: {}", p);
                return Ok(Some(Response::text(MSG_NO_SUCH_PATH)));
            }
            Err(ResolveError::OutsideRoot(p)) => {
                // Mismo mensaje que NotFound: no se le confirma al
                // cliente que el path escapaba del root
                println!("   ❌ Intento de escape del root: {}", p);
                return Ok(Some(Response::text(MSG_NO_SUCH_PATH)));
            }
        };

        if resolved.is_dir() {
            println!("   ✅ Listando {}", resolved.display());
            match storage::render(&resolved) {
                Ok(page) => Ok(Some(Response::html(&page))),
                Err(e) => {
                    println!("   ❌ Error listando {}: {}", resolved.display(), e);
                    Ok(Some(Response::text(MSG_LISTING_ERROR)))
                }
            }
        } else {
            println!("   ✅ Descargando {}", resolved.display());
            match DownloadStreamer::open(&resolved) {
                Ok(streamer) => {
                    streamer.send(out, self.observer.as_ref())?;
                    Ok(None)
                }
                Err(e) => {
                    println!("   ❌ Error abriendo {}: {}", resolved.display(), e);
                    Ok(Some(Response::text(MSG_DOWNLOAD_ERROR)))
                }
            }
        }
    }

    /// El Content-Type declara un body multipart (prefix match)
    fn is_multipart(request: &Request) -> bool {
        request
            .header("content-type")
            .map(|ct| ct.trim_start().starts_with("multipart/form-data"))
            .unwrap_or(false)
    }

    /// Extrae el parámetro boundary del Content-Type
    ///
    /// Formato: `multipart/form-data; boundary=----XYZ`
    fn boundary_param(request: &Request) -> Option<String> {
        let content_type = request.header("content-type")?;
        for param in content_type.split(';') {
            let param = param.trim();
            if let Some(value) = param.strip_prefix("boundary=") {
                return Some(value.trim_matches('"').to_string());
            }
        }
        None
    }

    /// Agrega headers comunes a todas las respuestas fijas
    fn add_common_headers(&self, response: &mut Response) {
        response.add_header("Server", "FileBridge-HTTP/1.0");
        response.add_header("Connection", "close");
    }
}
