use std::sync::{Arc, Barrier};
use std::thread;

use obra_core::models::*;
use obra_core::Database;

#[test]
fn concurrent_first_reads_create_four_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obra.db");

    let db = Database::open(&path).unwrap();
    db.migrate().unwrap();
    let worker = db
        .create_user(CreateUserInput {
            username: "juan".into(),
            email: "juan@obra.test".into(),
            password: "pw".into(),
            nombre: "Juan".into(),
            apellido: "Pérez".into(),
            rol: Role::FieldWorker,
        })
        .unwrap();
    let obra = db
        .create_worksite(CreateWorksiteInput {
            nombre: "Casa".into(),
            ubicacion: "Calle 1".into(),
            latitud: None,
            longitud: None,
            descripcion: None,
            albanil_asignado: worker.id,
            jefe_obra: None,
        })
        .unwrap()
        .id;
    let actor = Actor::new(worker.id, Role::FieldWorker);

    const READERS: usize = 8;
    let barrier = Arc::new(Barrier::new(READERS));
    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            // Separate connections so the readers really race in SQLite.
            let conn = Database::open(&path).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                conn.get_progress(obra, &actor).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let progress = handle.join().unwrap();
        assert_eq!(progress.len(), 4);
    }

    let progress = db.get_progress(obra, &actor).unwrap();
    assert_eq!(progress.len(), 4);
    let mut steps: Vec<_> = progress.iter().map(|p| p.paso).collect();
    steps.dedup();
    assert_eq!(steps, Step::ALL.to_vec());
}
