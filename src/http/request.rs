//! # Parsing de Requests HTTP/1.0
//!
//! Este módulo implementa un parser HTTP/1.0 desde cero.
//!
//! A diferencia de un parser que recibe el request completo en un buffer,
//! este parser lee **solo la cabecera** (request line + headers) desde el
//! stream de la conexión y deja el body sin consumir. Esto es fundamental
//! para los uploads: el body puede ser arbitrariamente grande y debe
//! procesarse en streaming, nunca cargarse completo en memoria.
//!
//! ## Formato de un Request HTTP/1.0
//!
//! ```text
//! GET /path?param1=value1&param2=value2 HTTP/1.0\r\n
//! Host: localhost:8080\r\n
//! Content-Type: multipart/form-data; boundary=XYZ\r\n
//! \r\n
//! (body, si lo hay, queda en el stream)
//! ```
//!
//! ## Headers case-insensitive
//!
//! Los nombres de headers se normalizan a minúsculas al insertar. Si un
//! header aparece repetido, gana el último (last-write-wins).

use std::collections::HashMap;
use std::io::BufRead;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Listar un directorio o descargar un archivo
    GET,

    /// HEAD - Como GET pero solo retorna headers
    HEAD,

    /// POST - Subir archivos (multipart/form-data)
    POST,

    /// PUT - No tiene handler propio; cae en la respuesta permisiva
    PUT,

    /// DELETE - No tiene handler propio; cae en la respuesta permisiva
    DELETE,

    /// OPTIONS - No tiene handler propio; cae en la respuesta permisiva
    OPTIONS,
}

impl Method {
    /// Parsea un método HTTP desde un string
    ///
    /// # Errores
    ///
    /// Retorna error si el método no es soportado
    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "OPTIONS" => Ok(Method::OPTIONS),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
        }
    }
}

/// Representa la cabecera de un request HTTP/1.0 parseada
///
/// El body NO forma parte de este tipo: queda en el reader de la conexión
/// y lo consume quien lo necesite (el parser multipart, por ejemplo).
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP (GET, POST, ...)
    method: Method,

    /// Path de la petición tal como llegó, sin decodificar (ej: "/docs/a%20b.txt")
    path: String,

    /// Query parameters parseados (ej: {"num": "10"})
    query_params: HashMap<String, String>,

    /// Headers HTTP con nombres en minúsculas (ej: {"content-type": "..."})
    headers: HashMap<String, String>,

    /// Versión HTTP (HTTP/1.0 o HTTP/1.1)
    version: String,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request incompleto o truncado (EOF antes de la línea vacía)
    IncompleteRequest,

    /// Formato inválido de la request line
    InvalidRequestLine,

    /// Método HTTP no soportado
    UnsupportedMethod(String),

    /// Versión HTTP incorrecta (debe ser HTTP/1.0 o HTTP/1.1)
    InvalidHttpVersion(String),

    /// Header malformado
    InvalidHeader(String),

    /// Request vacío
    EmptyRequest,

    /// Error de I/O leyendo del socket
    Io(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::IncompleteRequest => write!(f, "Incomplete HTTP request"),
            ParseError::InvalidRequestLine => write!(f, "Invalid request line format"),
            ParseError::UnsupportedMethod(m) => write!(f, "Unsupported HTTP method: {}", m),
            ParseError::InvalidHttpVersion(v) => write!(f, "Invalid HTTP version: {}", v),
            ParseError::InvalidHeader(h) => write!(f, "Invalid header: {}", h),
            ParseError::EmptyRequest => write!(f, "Empty request"),
            ParseError::Io(e) => write!(f, "I/O error reading request: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl Request {
    /// Lee y parsea la cabecera de un request desde el stream de la conexión
    ///
    /// Consume bytes del reader hasta la línea vacía que separa headers de
    /// body (inclusive). El body queda disponible en el mismo reader.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use file_server::http::Request;
    /// use std::io::BufReader;
    ///
    /// let raw: &[u8] = b"POST /upload HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello";
    /// let mut reader = BufReader::new(raw);
    /// let request = Request::read_head(&mut reader).unwrap();
    ///
    /// assert_eq!(request.path(), "/upload");
    /// assert_eq!(request.content_length(), Some(5));
    /// // "hello" sigue sin consumir en `reader`
    /// ```
    pub fn read_head<R: BufRead>(reader: &mut R) -> Result<Self, ParseError> {
        // 1. Request line
        let request_line = match Self::read_line(reader)? {
            // EOF inmediato: el peer conectó y cerró sin mandar nada
            None => return Err(ParseError::EmptyRequest),
            Some(line) if line.trim().is_empty() => return Err(ParseError::EmptyRequest),
            Some(line) => line,
        };
        let (method, path, query_params, version) = Self::parse_request_line(&request_line)?;

        // 2. Headers, hasta la línea vacía
        let mut headers = HashMap::new();
        loop {
            let line = match Self::read_line(reader)? {
                // EOF antes de la línea vacía que cierra la cabecera
                None => return Err(ParseError::IncompleteRequest),
                Some(line) => line,
            };
            if line.trim().is_empty() {
                break;
            }

            // Buscar el separador ':'
            if let Some(colon_pos) = line.find(':') {
                // Nombres en minúsculas: los headers HTTP son case-insensitive
                let name = line[..colon_pos].trim().to_lowercase();
                let value = line[colon_pos + 1..].trim().to_string();
                headers.insert(name, value);
            } else {
                // Header sin ':' es inválido
                return Err(ParseError::InvalidHeader(line.trim().to_string()));
            }
        }

        Ok(Request {
            method,
            path,
            query_params,
            headers,
            version,
        })
    }

    /// Parsea la cabecera de un request desde un buffer completo
    ///
    /// Conveniencia para tests. El body que siga a la cabecera se ignora.
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = std::io::Cursor::new(buffer);
        Self::read_head(&mut cursor)
    }

    /// Lee una línea terminada en \r\n (o \n) del reader
    ///
    /// Retorna `Ok(None)` en EOF inmediato. EOF a mitad de línea se trata
    /// como request truncado.
    fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, ParseError> {
        let mut raw = Vec::new();
        let n = reader
            .read_until(b'\n', &mut raw)
            .map_err(|e| ParseError::Io(e.to_string()))?;

        if n == 0 {
            return Ok(None);
        }
        if !raw.ends_with(b"\n") {
            return Err(ParseError::IncompleteRequest);
        }

        let line = String::from_utf8(raw).map_err(|_| ParseError::InvalidRequestLine)?;
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Parsea la request line (primera línea del request)
    ///
    /// Formato: `GET /path?query HTTP/1.0`
    fn parse_request_line(
        line: &str,
    ) -> Result<(Method, String, HashMap<String, String>, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        // Debe tener exactamente 3 partes: METHOD PATH VERSION
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        // Parsear método
        let method = Method::from_str(parts[0])?;

        // Parsear path y query
        let (path, query_params) = Self::parse_path_and_query(parts[1]);

        // Validar versión HTTP
        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, path, query_params, version))
    }

    /// Parsea el path y extrae los query parameters
    ///
    /// Ejemplo: "/docs?sort=name&raw=true"
    /// Retorna: ("/docs", {"sort": "name", "raw": "true"})
    fn parse_path_and_query(path_with_query: &str) -> (String, HashMap<String, String>) {
        // Buscar el símbolo '?' que separa path de query
        if let Some(query_start) = path_with_query.find('?') {
            let path = path_with_query[..query_start].to_string();
            let query_string = &path_with_query[query_start + 1..];
            let query_params = Self::parse_query_string(query_string);
            (path, query_params)
        } else {
            // No hay query parameters
            (path_with_query.to_string(), HashMap::new())
        }
    }

    /// Parsea una query string en un HashMap
    ///
    /// Ejemplo: "name=a%20b&fast=true"
    /// Retorna: {"name": "a b", "fast": "true"}
    fn parse_query_string(query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        // Separar por '&' para obtener cada parámetro
        for param in query.split('&') {
            if param.is_empty() {
                continue;
            }

            // Separar por '=' para obtener key y value
            if let Some(eq_pos) = param.find('=') {
                let key = &param[..eq_pos];
                let value = &param[eq_pos + 1..];

                let decoded_value = Self::url_decode(value);
                params.insert(key.to_string(), decoded_value);
            } else {
                // Parámetro sin valor (ej: "?debug")
                params.insert(param.to_string(), String::new());
            }
        }

        params
    }

    /// Decodifica un valor percent-encoded ("a%20b" → "a b", "+" → espacio)
    fn url_decode(s: &str) -> String {
        let with_spaces = s.replace('+', " ");
        match urlencoding::decode(&with_spaces) {
            Ok(decoded) => decoded.into_owned(),
            // Secuencias % inválidas: se deja el valor tal cual
            Err(_) => with_spaces,
        }
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> Method {
        self.method
    }

    /// Obtiene el path del request (sin decodificar)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene todos los query parameters
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Obtiene un query parameter específico
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Obtiene todos los headers (nombres en minúsculas)
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header específico (búsqueda case-insensitive)
    ///
    /// # Ejemplo
    /// ```
    /// use file_server::http::Request;
    ///
    /// let raw = b"GET / HTTP/1.0\r\nContent-Type: text/plain\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.header("content-type"), Some("text/plain"));
    /// assert_eq!(request.header("Content-Type"), Some("text/plain"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Obtiene el Content-Length declarado, si lo hay y es un número válido
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }
}
