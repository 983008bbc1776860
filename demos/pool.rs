extern crate cokit;

use std::thread;
use std::time::Duration;

use cokit::pool::Builder;

fn main() {
    println!("=== thread pool ===");
    let pool = Builder::new()
        .workers(4)
        .name("demo".into())
        .on_panic(|name, err| println!("{name} reported: {err}"))
        .build()
        .unwrap();

    for i in 0..8 {
        pool.enqueue(move || {
            let name = thread::current().name().map(str::to_owned);
            println!("Task {i} executing on {}", name.as_deref().unwrap_or("?"));
            thread::sleep(Duration::from_millis(100));
        })
        .unwrap();
    }

    // keep the default hook from printing the caught panic
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    pool.enqueue(|| panic!("this job fails")).unwrap();

    let answer = pool.submit(|| 6 * 7).unwrap();
    println!("submitted job returned {:?}", answer.join());

    println!("{pool:?}");
    pool.join();
    std::panic::set_hook(hook);
    println!("All tasks completed");
}
