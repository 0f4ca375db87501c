#![no_main]

use libfuzzer_sys::fuzz_target;
use rand::Rng;
use skiplog::{validate, SharedLog, SkipListSet};
use std::sync::Arc;

fuzz_target!(|_data: &[u8]| {
    let list = Arc::new(SkipListSet::<u8, SharedLog>::new());

    let threads = (0..8)
        .map(|thread_id| {
            let list = list.clone();
            std::thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..2_000 {
                    let target = rng.gen::<u8>();
                    match rng.gen::<u8>() % 5 {
                        0 => {
                            list.remove(thread_id, &target);
                        }
                        1 => {
                            list.contains(thread_id, &target);
                        }
                        _ => {
                            list.add(thread_id, target);
                        }
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    for thread in threads {
        thread.join().unwrap()
    }

    let entries = list.log();
    assert_eq!(entries.len(), 8 * 2_000);
    validate(&entries);
});
