extern crate cokit;

use cokit::sequences::{self, Tree};
use cokit::Generator;

fn print_all<T: std::fmt::Display>(title: &str, g: Generator<'_, T>) {
    print!("{title}: ");
    for v in g {
        print!("{v} ");
    }
    println!();
}

fn main() {
    println!("=== generator ===");
    print_all("Range [0, 10)", sequences::range(0, 10));
    print_all("First 10 Fibonacci numbers", sequences::fibonacci(10));

    println!("\n=== yield patterns ===");
    print_all("Even numbers up to 20", sequences::even_numbers(20));
    print_all("Words", sequences::words("Hello Coroutine World"));

    println!("\n=== generator state ===");
    let mut g = sequences::range(1, 100);
    println!("state before the first pull: {:?}", g.state());
    for name in ["First", "Second", "Third"] {
        if let Ok(true) = g.advance() {
            println!("  {name} value: {}", g.current().unwrap());
        }
    }
    println!("state after three pulls: {:?}", g.state());
    println!("values are computed on demand, the other 96 never are");

    println!("\n=== tree traversal ===");
    //       4
    //     /   \
    //    2     6
    //   / \   / \
    //  1   3 5   7
    let tree = Tree::node(
        4,
        Tree::node(2, Tree::leaf(1), Tree::leaf(3)),
        Tree::node(6, Tree::leaf(5), Tree::leaf(7)),
    );
    print_all("Inorder traversal", tree.inorder());

    println!("\n=== failure ===");
    let mut g = Generator::new(|y| {
        y.yield_(1);
        panic!("generator body failed");
    });
    // keep the default hook from printing the caught panic
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    loop {
        match g.try_next() {
            Ok(Some(v)) => println!("got {v}"),
            Ok(None) => break,
            Err(e) => println!("error: {e}"),
        }
    }
    std::panic::set_hook(hook);
}
