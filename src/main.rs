//! # File Server - Entry Point
//!
//! Punto de entrada del servidor de archivos HTTP/1.0.
//!
//! La configuración llega por CLI o variables de entorno (ver `config`).
//! El binario registra un observer de consola para que las transferencias
//! se vean en stdout.

use file_server::config::Config;
use file_server::server::Server;
use file_server::transfer::LogObserver;
use std::sync::Arc;

fn main() {
    println!("=================================");
    println!("  FileBridge HTTP/1.0 Server");
    println!("=================================\n");

    // Crear configuración (CLI args o env vars)
    let config = Config::new();

    if let Err(e) = config.validate() {
        eprintln!("💥 Configuración inválida: {}", e);
        std::process::exit(1);
    }

    // El storage root se crea si no existe
    if let Err(e) = std::fs::create_dir_all(&config.storage_root) {
        eprintln!("💥 No se pudo crear el storage root {}: {}", config.storage_root, e);
        std::process::exit(1);
    }

    config.print_summary();

    // Crear el servidor con el observer de consola
    let mut server = match Server::new(config, Arc::new(LogObserver)) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("💥 Error preparando el servidor: {}", e);
            std::process::exit(1);
        }
    };

    // Iniciar el servidor (esto bloqueará el thread)
    if let Err(e) = server.run() {
        eprintln!("💥 Error fatal: {}", e);
        std::process::exit(1);
    }
}
