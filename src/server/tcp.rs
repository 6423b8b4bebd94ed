//! # Servidor TCP Concurrente
//!
//! Implementación del servidor TCP que maneja múltiples conexiones
//! simultáneas usando threads. Cada conexión se procesa en su propio
//! thread, con el total acotado por `max_connections`: cuando el cupo
//! está lleno, el accept loop espera a que un worker termine antes de
//! aceptar la siguiente conexión.
//!
//! ## Apagado
//!
//! `ShutdownHandle::stop()` marca el flag de apagado y abre una conexión
//! de cortesía contra el propio listener para destrabar el `accept`. El
//! loop retorna sin drenar: las conexiones en vuelo siguen en sus threads
//! y terminan solas.

use crate::config::Config;
use crate::http::Request;
use crate::router::Router;
use crate::storage::PathResolver;
use crate::transfer::StatusObserver;
use std::io::{self, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;

/// Cupo de conexiones concurrentes
///
/// Contador protegido por Mutex + Condvar: `acquire` bloquea mientras el
/// cupo esté lleno y `release` despierta a un esperante.
struct ConnectionLimiter {
    active: Mutex<usize>,
    condvar: Condvar,
    max: usize,
}

impl ConnectionLimiter {
    fn new(max: usize) -> Self {
        Self {
            active: Mutex::new(0),
            condvar: Condvar::new(),
            // Un cupo de 0 dejaría el accept loop trabado para siempre
            max: max.max(1),
        }
    }

    /// Bloquea hasta que haya cupo y lo toma
    fn acquire(&self) {
        let mut active = self.active.lock().unwrap();
        while *active >= self.max {
            active = self.condvar.wait(active).unwrap();
        }
        *active += 1;
    }

    /// Devuelve el cupo y despierta a un esperante
    fn release(&self) {
        let mut active = self.active.lock().unwrap();
        *active -= 1;
        drop(active);
        self.condvar.notify_one();
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        *self.active.lock().unwrap()
    }
}

/// Handle para detener el servidor desde otro thread
///
/// Clonable: el host puede repartirlo (un handler de señales, un botón de
/// la UI). `stop` es idempotente.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    address: SocketAddr,
}

impl ShutdownHandle {
    /// Marca el apagado y destraba el accept loop
    ///
    /// Retorna de inmediato, sin esperar a las conexiones en vuelo.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Conexión de cortesía: accept retorna y el loop ve el flag
        let _ = TcpStream::connect(self.address);
    }
}

/// Servidor HTTP/1.0 concurrente sobre el storage root
pub struct Server {
    config: Config,
    router: Arc<Router>,
    limiter: Arc<ConnectionLimiter>,
    shutdown: Arc<AtomicBool>,
    listener: Option<TcpListener>,
}

impl Server {
    /// Crea el servidor con la configuración y el observer dados
    ///
    /// Falla si el storage root no existe o no se puede canonicalizar.
    pub fn new(config: Config, observer: Arc<dyn StatusObserver>) -> io::Result<Self> {
        let resolver = PathResolver::new(config.storage_root.as_ref())?;
        let router = Router::new(resolver, observer);
        let limiter = ConnectionLimiter::new(config.max_connections);

        Ok(Self {
            config,
            router: Arc::new(router),
            limiter: Arc::new(limiter),
            shutdown: Arc::new(AtomicBool::new(false)),
            listener: None,
        })
    }

    /// Liga el socket de escucha y retorna la dirección efectiva
    ///
    /// Con puerto 0 el sistema asigna uno libre; la dirección retornada
    /// trae el puerto real.
    pub fn bind(&mut self) -> io::Result<SocketAddr> {
        let address = self.config.address();
        println!("[*] Iniciando servidor en {}", address);

        let listener = TcpListener::bind(&address)?;
        let local = listener.local_addr()?;
        self.listener = Some(listener);

        println!("[+] Servidor escuchando en {}", local);
        Ok(local)
    }

    /// Handle de apagado; requiere haber llamado a `bind`
    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "server is not bound yet")
        })?;

        Ok(ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            address: listener.local_addr()?,
        })
    }

    /// Loop principal: acepta conexiones hasta que llegue el apagado
    ///
    /// Bloquea el thread que lo llama. Liga el socket si `bind` no se
    /// llamó antes.
    pub fn run(&mut self) -> io::Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = match self.listener.as_ref() {
            Some(l) => l,
            None => return Ok(()),
        };

        println!("[*] Modo concurrente: un thread por conexion (max {})\n", self.config.max_connections);

        for stream in listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                // La conexión que nos despertó (si la hubo) se descarta
                break;
            }

            match stream {
                Ok(stream) => {
                    let peer_addr = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());

                    // Tomar cupo antes de spawnear: con el cupo lleno, el
                    // accept espera acá hasta que un worker termine
                    self.limiter.acquire();
                    println!(" ✅ Nueva conexión desde: {} (spawning thread)", peer_addr);

                    let router = Arc::clone(&self.router);
                    let limiter = Arc::clone(&self.limiter);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection_static(stream, router) {
                            eprintln!("   ❌ Error en thread: {}", e);
                        }
                        limiter.release();
                    });
                }
                Err(e) => {
                    eprintln!("   ❌ Error al aceptar conexión: {}", e);
                }
            }
        }

        println!("[*] Servidor detenido (conexiones en vuelo siguen solas)");
        Ok(())
    }

    /// Genera un Request ID único para los logs
    ///
    /// Mezcla un contador de proceso con el reloj y el thread: dos
    /// requests seguidos en el mismo thread también reciben ids distintos.
    fn next_request_id() -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        use std::sync::atomic::AtomicU64;

        static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

        let mut hasher = DefaultHasher::new();
        REQUEST_SEQ.fetch_add(1, Ordering::Relaxed).hash(&mut hasher);
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
            .hash(&mut hasher);
        thread::current().id().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Procesa una conexión completa: un request, una respuesta
    fn handle_connection_static(stream: TcpStream, router: Arc<Router>) -> io::Result<()> {
        let start = Instant::now();
        let request_id = Self::next_request_id();

        // Reader bufferizado para la cabecera; el body queda en el mismo
        // reader y el router lo consume en streaming
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);

        let request = match Request::read_head(&mut reader) {
            Ok(request) => request,
            Err(crate::http::ParseError::EmptyRequest) => {
                println!("   ✅ Conexión cerrada sin request [req_id: {}]", &request_id[..8]);
                return Ok(());
            }
            Err(e) => {
                println!("   ❌ Parse error: {} [req_id: {}]", e, &request_id[..8]);
                let mut reply = crate::http::Response::text("Error! Bad request");
                reply.add_header("Server", "FileBridge-HTTP/1.0");
                reply.add_header("Connection", "close");
                writer.write_all(&reply.to_bytes())?;
                writer.flush()?;
                return Ok(());
            }
        };

        println!(
            "   ✅ {} {} [req_id: {}]",
            request.method().as_str(),
            request.path(),
            &request_id[..8]
        );

        router.handle(&request, &mut reader, &mut writer)?;

        let latency = start.elapsed();
        println!(
            "   ✅ Listo ({:.2}ms) [req_id: {}]\n",
            latency.as_secs_f64() * 1000.0,
            &request_id[..8]
        );

        Ok(())
    }
}
