//! # Parser Streaming de Multipart
//!
//! Este módulo implementa un parser incremental de bodies
//! `multipart/form-data` (RFC 2046). Es la pieza central del upload: un
//! archivo subido puede ser arbitrariamente grande, así que el body
//! **nunca** se materializa completo en memoria. El parser escanea el
//! boundary dentro de una ventana deslizante acotada y expone el body de
//! cada parte como un `Read`.
//!
//! ## Formato de un body multipart
//!
//! ```text
//! --BOUNDARY\r\n
//! Content-Disposition: form-data; name="file"; filename="nota.txt"\r\n
//! \r\n
//! (bytes del archivo)\r\n
//! --BOUNDARY\r\n
//! Content-Disposition: form-data; name="comentario"\r\n
//! \r\n
//! hola\r\n
//! --BOUNDARY--\r\n
//! ```
//!
//! ## Modelo de uso
//!
//! Secuencia lazy, finita y no reiniciable: `next_part()` avanza hasta la
//! próxima parte y retorna un [`Part`] que toma prestado el parser. El
//! stream de una parte solo es válido hasta el próximo `next_part()`; si
//! la parte anterior no se drenó, el parser la descarta solo.
//!
//! Un body que termina sin el boundary de cierre (`--BOUNDARY--`) es un
//! error (`UnexpectedEof`), nunca una truncación silenciosa.

use std::io::{self, Read};

/// Tamaño del chunk de lectura del stream de entrada
const CHUNK_SIZE: usize = 8192;

/// Límite para el bloque de headers de una parte
///
/// Mantiene acotada la ventana del parser: los headers de una parte
/// legítima caben de sobra acá.
const MAX_PART_HEADER_BLOCK: usize = 16 * 1024;

/// Errores del parsing multipart
#[derive(Debug)]
pub enum MultipartError {
    /// Headers de una parte malformados (sin CRLF de cierre, no UTF-8,
    /// bloque gigante)
    InvalidHeaders(String),

    /// Una parte sin `Content-Disposition: form-data; name=...`
    MissingDisposition,

    /// El body terminó sin el boundary de cierre
    UnexpectedEof,

    /// Error de I/O leyendo el stream de entrada
    Io(io::Error),
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipartError::InvalidHeaders(detail) => {
                write!(f, "Malformed part headers: {}", detail)
            }
            MultipartError::MissingDisposition => {
                write!(f, "Part without Content-Disposition name")
            }
            MultipartError::UnexpectedEof => {
                write!(f, "Multipart body ended without closing boundary")
            }
            MultipartError::Io(e) => write!(f, "I/O error reading multipart body: {}", e),
        }
    }
}

impl std::error::Error for MultipartError {}

impl From<MultipartError> for io::Error {
    /// `Part` implementa `io::Read`, así que sus errores viajan como
    /// `io::Error`. El kind preserva la distinción que le importa al
    /// router: `UnexpectedEof` es body malformado, el resto es I/O.
    fn from(err: MultipartError) -> io::Error {
        match err {
            MultipartError::Io(e) => e,
            MultipartError::UnexpectedEof => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err.to_string())
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Parser incremental de un body multipart
pub struct MultipartParser<R: Read> {
    /// Stream de entrada (el body del request, ya limitado por Content-Length)
    reader: R,

    /// Delimitador completo: `\r\n--` + boundary
    delimiter: Vec<u8>,

    /// Ventana deslizante de bytes sin consumir
    buffer: Vec<u8>,

    /// Ya se consumió el primer boundary
    started: bool,

    /// Hay una parte cuyo body todavía no se drenó hasta su boundary
    in_body: bool,

    /// Se vio el boundary de cierre (`--boundary--`)
    finished: bool,
}

impl<R: Read> MultipartParser<R> {
    /// Crea un parser sobre el stream del body con el boundary declarado
    /// en el Content-Type del request
    pub fn new(reader: R, boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        // El primer boundary puede venir al inicio absoluto del stream,
        // sin CRLF previo. Sembrar el buffer con CRLF unifica ese caso
        // con el resto del escaneo.
        Self {
            reader,
            delimiter,
            buffer: b"\r\n".to_vec(),
            started: false,
            in_body: false,
            finished: false,
        }
    }

    /// Avanza hasta la próxima parte del body
    ///
    /// Retorna `Ok(None)` cuando se consumió el boundary de cierre. Si la
    /// parte anterior no fue leída por completo, se drena primero.
    pub fn next_part(&mut self) -> Result<Option<Part<'_, R>>, MultipartError> {
        if self.finished {
            return Ok(None);
        }

        if self.in_body || !self.started {
            // Drenar la parte anterior (o el preámbulo) hasta el boundary
            self.skip_to_boundary()?;
            self.started = true;
        }

        if self.finished {
            return Ok(None);
        }

        let (field_name, filename) = self.read_part_headers()?;
        self.in_body = true;

        Ok(Some(Part {
            field_name,
            filename,
            parser: self,
        }))
    }

    /// Rellena el buffer con un chunk del stream
    ///
    /// Retorna la cantidad de bytes leídos (0 = EOF).
    fn fill(&mut self) -> Result<usize, MultipartError> {
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = self.reader.read(&mut chunk).map_err(MultipartError::Io)?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Consume bytes hasta el próximo boundary confirmado, inclusive
    ///
    /// Un boundary solo cuenta como tal con su cola: `--` marca el cierre
    /// del body, `\r\n` el inicio de una parte. Un match del delimitador
    /// con cualquier otra cola es contenido.
    fn skip_to_boundary(&mut self) -> Result<(), MultipartError> {
        loop {
            match scan_boundary(&self.buffer, &self.delimiter) {
                BoundaryScan::Found { pos, closing } => {
                    // Delimitador + cola de 2 bytes
                    self.buffer.drain(..pos + self.delimiter.len() + 2);
                    if closing {
                        self.finished = true;
                    }
                    self.in_body = false;
                    return Ok(());
                }
                BoundaryScan::NotFound { safe } => {
                    // Descartar lo confirmado como no-boundary; la ventana
                    // queda acotada
                    self.buffer.drain(..safe);
                    if self.fill()? == 0 {
                        return Err(MultipartError::UnexpectedEof);
                    }
                }
            }
        }
    }

    /// Lee y parsea el bloque de headers de una parte
    ///
    /// Retorna `(name, filename)` del Content-Disposition. Los headers se
    /// parsean **antes** de exponer el body de la parte.
    fn read_part_headers(&mut self) -> Result<(String, Option<String>), MultipartError> {
        // Buscar el \r\n\r\n que cierra el bloque de headers
        let end = loop {
            if let Some(pos) = find_subslice(&self.buffer, b"\r\n\r\n") {
                break pos;
            }
            if self.buffer.len() > MAX_PART_HEADER_BLOCK {
                return Err(MultipartError::InvalidHeaders(
                    "part header block too large".to_string(),
                ));
            }
            if self.fill()? == 0 {
                return Err(MultipartError::UnexpectedEof);
            }
        };

        let header_bytes: Vec<u8> = self.buffer[..end].to_vec();
        self.buffer.drain(..end + 4);

        let text = String::from_utf8(header_bytes).map_err(|_| {
            MultipartError::InvalidHeaders("part headers are not valid UTF-8".to_string())
        })?;

        let mut name = None;
        let mut filename = None;

        for line in text.split("\r\n") {
            if !line.to_lowercase().starts_with("content-disposition:") {
                continue;
            }

            // Formato: form-data; name="campo"; filename="nota.txt"
            let params = &line["content-disposition:".len()..];
            for param in params.split(';') {
                let param = param.trim();
                if let Some(eq_pos) = param.find('=') {
                    let key = param[..eq_pos].trim().to_lowercase();
                    let value = unquote(param[eq_pos + 1..].trim());
                    match key.as_str() {
                        "name" => name = Some(value),
                        "filename" => filename = Some(value),
                        _ => {}
                    }
                }
            }
        }

        let name = name.ok_or(MultipartError::MissingDisposition)?;
        Ok((name, filename))
    }
}

/// Remueve comillas dobles envolventes de un valor de parámetro
fn unquote(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Busca la primera ocurrencia de `needle` dentro de `haystack`
fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Resultado de buscar un boundary confirmado dentro de la ventana
enum BoundaryScan {
    /// Delimitador con cola válida en `pos`; `closing` si la cola es `--`
    Found { pos: usize, closing: bool },

    /// Sin boundary confirmado; los primeros `safe` bytes son contenido
    /// seguro (el resto puede ser un boundary a medio llegar)
    NotFound { safe: usize },
}

/// Busca un boundary confirmado: el delimitador seguido de `--` (cierre)
/// o de `\r\n` (próxima parte)
///
/// El contenido de una parte puede incluir la secuencia del delimitador
/// (datos binarios, texto con guiones): un match con cualquier otra cola
/// es contenido normal y el escaneo sigue después de él. Un match cuya
/// cola todavía no llegó al buffer queda sin confirmar, y `safe` se
/// detiene justo antes.
fn scan_boundary(buffer: &[u8], delimiter: &[u8]) -> BoundaryScan {
    let mut from = 0;
    loop {
        let rel = match find_subslice(&buffer[from..], delimiter) {
            Some(rel) => rel,
            None => {
                // Retener una cola de posible prefijo de delimitador;
                // todo lo anterior (falsos matches incluidos) es contenido
                let holdback = delimiter.len() - 1;
                return BoundaryScan::NotFound {
                    safe: buffer.len().saturating_sub(holdback).max(from),
                };
            }
        };

        let pos = from + rel;
        let tail_start = pos + delimiter.len();
        if buffer.len() < tail_start + 2 {
            // Cola incompleta: esperar más datos antes de decidir
            return BoundaryScan::NotFound { safe: pos };
        }

        let tail = &buffer[tail_start..tail_start + 2];
        if tail == b"--" {
            return BoundaryScan::Found { pos, closing: true };
        } else if tail == b"\r\n" {
            return BoundaryScan::Found { pos, closing: false };
        }
        // Falso positivo: seguir buscando después del match
        from = pos + 1;
    }
}

/// Una parte lógica de un body multipart
///
/// Toma prestado el parser: su stream solo es válido mientras esta parte
/// sea la activa. Con `filename` es una parte de archivo (body como
/// stream); sin `filename` es un campo de formulario (ver [`Part::value`]).
pub struct Part<'a, R: Read> {
    field_name: String,
    filename: Option<String>,
    parser: &'a mut MultipartParser<R>,
}

impl<R: Read> Part<'_, R> {
    /// Nombre del campo (`name=` del Content-Disposition)
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Filename declarado, si la parte es un archivo
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// La parte es un archivo (tiene `filename=`)
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// Lee el body completo de la parte como valor de formulario
    ///
    /// Solo para campos: el body de un archivo debe copiarse en streaming
    /// con `io::copy`, no materializarse acá.
    pub fn value(mut self) -> Result<String, MultipartError> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)
            .map_err(MultipartError::Io)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<R: Read> Read for Part<'_, R> {
    /// Entrega bytes del body de la parte hasta el próximo boundary
    ///
    /// Retiene siempre un posible prefijo de delimitador, así un boundary
    /// partido entre dos chunks del socket se detecta igual. `Ok(0)`
    /// marca el fin de la parte (el boundary ya quedó consumido).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let parser = &mut *self.parser;
        if !parser.in_body {
            // La parte ya fue drenada
            return Ok(0);
        }

        loop {
            match scan_boundary(&parser.buffer, &parser.delimiter) {
                BoundaryScan::Found { pos: 0, closing } => {
                    // Boundary al frente: la parte terminó
                    parser.buffer.drain(..parser.delimiter.len() + 2);
                    if closing {
                        parser.finished = true;
                    }
                    parser.in_body = false;
                    return Ok(0);
                }
                BoundaryScan::Found { pos, .. } => {
                    // Hay `pos` bytes de body seguros antes del boundary
                    let n = buf.len().min(pos);
                    buf[..n].copy_from_slice(&parser.buffer[..n]);
                    parser.buffer.drain(..n);
                    return Ok(n);
                }
                BoundaryScan::NotFound { safe } if safe > 0 => {
                    let n = buf.len().min(safe);
                    buf[..n].copy_from_slice(&parser.buffer[..n]);
                    parser.buffer.drain(..n);
                    return Ok(n);
                }
                BoundaryScan::NotFound { .. } => {
                    if parser.fill().map_err(io::Error::from)? == 0 {
                        // EOF sin boundary de cierre: body malformado
                        return Err(io::Error::from(MultipartError::UnexpectedEof));
                    }
                }
            }
        }
    }
}
