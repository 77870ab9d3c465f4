use clap::{arg,crate_version,Command};
use huffpress::{static_huff, adaptive_huff, periodic_huff, Options};

const RCH: &str = "unreachable was reached";

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::init();
    let long_help =
"Examples:
---------
Compress:      `huffpress compress -m adaptive -i my_file -o my_file.huf`
Expand:        `huffpress expand -m adaptive -i my_file.huf -o my_file`
Wide symbols:  `huffpress compress -m static -b 2 -i my_file -o my_file.huf`
Shrinking:     `huffpress compress -m adaptive -k 16 -i my_file -o my_file.huf`
Periodic:      `huffpress compress -m periodic -p 14 -i my_file -o my_file.huf`";

    let methods = ["static","adaptive","periodic"];

    let mut main_cmd = Command::new("huffpress")
        .about("Compress and expand with Huffman codes")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "coding algorithm").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-b --width [BYTES] "bytes per symbol")
            .value_parser(clap::value_parser!(u8).range(1..=8)).default_value("1"))
        .arg(arg!(-k --chunk [MB] "adaptive: megabytes between weight shrinks, 0 disables")
            .value_parser(clap::value_parser!(u8)).default_value("0"))
        .arg(arg!(-a --alpha [FACTOR] "adaptive: weight divisor at each shrink")
            .value_parser(clap::value_parser!(u8).range(2..=255)).default_value("2"))
        .arg(arg!(-p --period [P] "periodic: rebuild the tree every 2^P symbols")
            .value_parser(clap::value_parser!(u8).range(10..=20)).default_value("10"))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-m --method <METHOD> "coding algorithm").required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let opt = Options {
            bytes_per_symbol: *cmd.get_one::<u8>("width").expect(RCH) as usize,
            chunk_size: *cmd.get_one::<u8>("chunk").expect(RCH) as usize,
            shrink_factor: *cmd.get_one::<u8>("alpha").expect(RCH) as usize,
            period_exponent: *cmd.get_one::<u8>("period").expect(RCH) as usize
        };
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::File::create(path_out)?;
        let (in_size,out_size) = match method.as_str() {
            "static" => static_huff::compress(&mut in_file,&mut out_file,&opt)?,
            "adaptive" => adaptive_huff::compress(&mut in_file,&mut out_file,&opt)?,
            "periodic" => periodic_huff::compress(&mut in_file,&mut out_file,&opt)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        log::info!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::File::create(path_out)?;
        let (in_size,out_size) = match method.as_str() {
            "static" => static_huff::expand(&mut in_file,&mut out_file)?,
            "adaptive" => adaptive_huff::expand(&mut in_file,&mut out_file)?,
            "periodic" => periodic_huff::expand(&mut in_file,&mut out_file)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        log::info!("expanded {} into {}",in_size,out_size);
    }

    Ok(())
}
