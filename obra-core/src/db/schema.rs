pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS usuarios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    nombre TEXT NOT NULL,
    apellido TEXT NOT NULL,
    rol TEXT NOT NULL CHECK (rol IN ('admin', 'jefe_obra', 'logistica', 'albanil')),
    activo INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sesiones (
    token TEXT PRIMARY KEY,
    usuario_id INTEGER NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS obras (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL,
    ubicacion TEXT NOT NULL,
    latitud REAL,
    longitud REAL,
    descripcion TEXT,
    estado TEXT NOT NULL DEFAULT 'pendiente' CHECK (estado IN ('pendiente', 'en_progreso', 'completada', 'cancelada')),
    albanil_asignado INTEGER REFERENCES usuarios(id),
    jefe_obra INTEGER REFERENCES usuarios(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS obra_progreso (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    obra_id INTEGER NOT NULL REFERENCES obras(id) ON DELETE CASCADE,
    paso INTEGER NOT NULL CHECK (paso IN (1, 2, 3, 4)),
    completado INTEGER NOT NULL DEFAULT 0,
    fecha_completado TEXT,
    comentarios TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS materiales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL UNIQUE,
    unidad TEXT NOT NULL,
    precio_unitario REAL NOT NULL DEFAULT 0,
    stock_disponible INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS obra_materiales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    obra_id INTEGER NOT NULL REFERENCES obras(id) ON DELETE CASCADE,
    material_id INTEGER NOT NULL REFERENCES materiales(id),
    usuario_id INTEGER REFERENCES usuarios(id),
    cantidad_solicitada INTEGER NOT NULL CHECK (cantidad_solicitada > 0),
    cantidad_aprobada INTEGER NOT NULL DEFAULT 0,
    estado TEXT NOT NULL DEFAULT 'pendiente' CHECK (estado IN ('pendiente', 'aprobado', 'rechazado')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fotos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    obra_id INTEGER NOT NULL REFERENCES obras(id) ON DELETE CASCADE,
    usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
    filename TEXT NOT NULL UNIQUE,
    tipo TEXT NOT NULL CHECK (tipo IN ('inicio', 'progreso', 'final')),
    descripcion TEXT,
    created_at TEXT NOT NULL
);

-- Files stored by /api/upload-foto that are not yet recorded in fotos
CREATE TABLE IF NOT EXISTS subidas (
    filename TEXT PRIMARY KEY,
    usuario_id INTEGER NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS mensajes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    obra_id INTEGER NOT NULL REFERENCES obras(id) ON DELETE CASCADE,
    usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
    mensaje TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sesiones_usuario ON sesiones(usuario_id);
CREATE INDEX IF NOT EXISTS idx_obras_albanil ON obras(albanil_asignado);
CREATE INDEX IF NOT EXISTS idx_obra_materiales_obra ON obra_materiales(obra_id);
CREATE INDEX IF NOT EXISTS idx_fotos_obra_tipo ON fotos(obra_id, tipo);
CREATE INDEX IF NOT EXISTS idx_mensajes_obra ON mensajes(obra_id);

-- Lazy progress initialization relies on this to stay at four rows per worksite
CREATE UNIQUE INDEX IF NOT EXISTS idx_progreso_obra_paso
    ON obra_progreso(obra_id, paso);
"#;

/// Default material catalog seeded on first migration.
pub const DEFAULT_MATERIALS: &[(&str, &str, f64, i64)] = &[
    ("Cemento", "bolsa", 15.50, 100),
    ("Arena", "m³", 25.00, 50),
    ("Grava", "m³", 30.00, 40),
    ("Ladrillo", "unidad", 0.75, 5000),
    ("Varilla de hierro", "metro", 8.20, 200),
    ("Cal", "bolsa", 12.00, 80),
];
