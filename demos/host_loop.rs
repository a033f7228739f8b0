use coweave::combinator::{first, OneOf2};
use coweave::stream::{Next, Stream};
use coweave::sync::Ticker;
use coweave::{coroutine, runtime, Exception, Wait};

/// Waits `n` frames of host loop.
fn frames(ticker: &Ticker, n: usize) -> Wait<()> {
    let ticker = ticker.clone();
    coroutine::spawn(async move {
        for _ in 0..n {
            ticker.wait().await?;
        }
        Ok::<_, Exception>(())
    })
}

/// Collects keys until `q` is pressed or three frames pass without input.
fn prompt(keys: Stream<char>, ticker: Ticker) -> Wait<String> {
    coroutine::spawn(async move {
        let mut line = String::new();
        loop {
            match first((keys.next(), frames(&ticker, 3))).await? {
                OneOf2::A('q') => break,
                OneOf2::A(key) => line.push(key),
                OneOf2::B(()) => {
                    eprintln!("prompt: idle, giving up");
                    break;
                },
            }
        }
        Ok::<_, Exception>(line)
    })
}

#[coweave::main]
fn main() {
    let keys = Stream::new();
    let ticker = Ticker::new();
    let line = prompt(keys.clone(), ticker.clone());

    let input = ["h", "", "e", "ll", "", "", "o", "q"];
    for (frame, pressed) in input.iter().enumerate() {
        pressed.chars().for_each(|key| keys.send(key));
        ticker.tick();
        let resumed = runtime::run_to_quiescence();
        eprintln!("frame {}: resumed {} coroutines", frame, resumed);
        if line.ready() {
            break;
        }
    }
    println!("line: {:?}", *line.get());
}
