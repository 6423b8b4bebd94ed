//! # Listado de Directorios
//!
//! Este módulo genera el documento HTML que permite navegar el storage
//! root desde un browser: un link por hijo inmediato del directorio (un
//! nivel, sin recursión), donde el target y la etiqueta son el path
//! absoluto del filesystem. Así el cliente puede seguir links para bajar
//! por el árbol y descargar archivos.
//!
//! El listado se calcula fresco en cada request (el contenido del
//! directorio puede cambiar entre requests; cachearlo mentiría sobre qué
//! hay disponible) y se ordena por nombre para que el resultado sea
//! determinista entre plataformas.
//!
//! ## Escapado
//!
//! Los nombres de archivo los controla quien sube archivos, así que las
//! etiquetas se escapan como HTML y los hrefs se percent-encodean por
//! segmento. Sin esto, un filename malicioso inyectaría markup en la
//! página de navegación.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lista los hijos inmediatos de un directorio, ordenados por nombre
///
/// Retorna paths absolutos. Se calcula fresco en cada llamada.
pub fn list_directory(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();

    entries.sort();
    Ok(entries)
}

/// Genera el documento HTML de navegación para un directorio
///
/// # Ejemplo
///
/// Para un directorio `/srv/docs` con `a.txt` y `b.txt`, la página
/// contiene dos links: uno a `/srv/docs/a.txt` y otro a `/srv/docs/b.txt`.
pub fn render(dir: &Path) -> io::Result<String> {
    let entries = list_directory(dir)?;

    let mut page = String::from(
        "<html><head><meta http-equiv=\"Content-Type\" \
         content=\"text/html; charset=utf-8\">\
         <title>HTTP File Browser</title></head><body>",
    );

    for entry in &entries {
        let label = entry.to_string_lossy();
        page.push_str(&format!(
            "<a href=\"{}\">{}</a><br>",
            encode_href(entry),
            html_escape(&label)
        ));
    }

    page.push_str("</body></html>");
    Ok(page)
}

/// Escapa los caracteres especiales de HTML de una etiqueta
fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Percent-encodea un path para usarlo como href, preservando los '/'
fn encode_href(path: &Path) -> String {
    path.to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
