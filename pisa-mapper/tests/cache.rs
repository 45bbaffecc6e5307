use std::path::Path;
use std::sync::Arc;

use pisa_data::context::Scheme;
use pisa_mapper::kernel::{KernelCache, KernelProtocol, KernelRequest};

fn request() -> KernelRequest {
    KernelRequest {
        scheme: Scheme::Bgv,
        op_name: "add".to_owned(),
        n: 16,
        key_rns: 2,
        q_size: 1,
        dnum: 1,
        alpha: 1,
        galois_elt: 0,
        rns_terms: 1,
        cipher_degree: 1,
        output_orders: vec![1],
        input_orders: vec![1, 1],
    }
}

/// A generator that logs every invocation before answering, slowly.
fn write_counting_kerngen(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("kerngen.sh");
    let counter = dir.join("invocations");
    let script = format!(
        "#!/bin/sh\ncat > /dev/null\necho run >> {}\nsleep 0.2\n\
         echo '13, add, output0_0_0, input0_0_0, input1_0_0, 0'\n",
        counter.display()
    );
    std::fs::write(&path, script).unwrap();

    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn concurrent_fetches_run_the_generator_once() {
    let dir = tempfile::tempdir().unwrap();
    let kerngen = write_counting_kerngen(dir.path());
    let cache = Arc::new(KernelCache::new(dir.path().join("cache"), true, false));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let kerngen = kerngen.clone();
        handles.push(std::thread::spawn(move || {
            cache
                .fetch(&kerngen, &request(), KernelProtocol::Stdin, None)
                .unwrap()
        }));
    }
    for handle in handles {
        let instructions = handle.join().unwrap();
        assert_eq!(instructions.len(), 1);
    }

    let invocations = std::fs::read_to_string(dir.path().join("invocations")).unwrap();
    assert_eq!(invocations.lines().count(), 1);
}

#[test]
fn disabled_cache_regenerates_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let kerngen = write_counting_kerngen(dir.path());
    let cache = KernelCache::new(dir.path().join("cache"), false, false);

    for _ in 0..2 {
        cache
            .fetch(&kerngen, &request(), KernelProtocol::Stdin, None)
            .unwrap();
    }
    let invocations = std::fs::read_to_string(dir.path().join("invocations")).unwrap();
    assert_eq!(invocations.lines().count(), 2);
}

#[test]
fn cache_directory_is_removed_on_drop_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let kerngen = write_counting_kerngen(dir.path());
    let cache_dir = dir.path().join("cache");
    {
        let cache = KernelCache::new(&cache_dir, true, true);
        cache
            .fetch(&kerngen, &request(), KernelProtocol::Stdin, None)
            .unwrap();
        assert!(cache_dir.exists());
    }
    assert!(!cache_dir.exists());
}
