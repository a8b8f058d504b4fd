//! Bootstrapping the dictionary.
//!
//! Apart from the natives, every word is threaded code laid down here by
//! hand, exactly as the compiler would lay it down. Forward branches are
//! emitted with a placeholder operand and patched once the target is known.

use tracing::debug;

use crate::{
    dictionary::{var, Dictionary, TIB},
    vm::builtins::NativeEntry,
    word::Xt,
    Addr, Cell, Error, CELL,
};

/// The words the engine jumps into directly.
pub(crate) struct Entry {
    pub(crate) quit: Xt,
    pub(crate) interpret: Xt,
}

#[derive(Clone, Copy)]
enum Op {
    /// Calls a word.
    Call(Xt),
    /// Pushes a value at run time, as `(LIT) n`.
    Lit(Cell),
}

use Op::{Call, Lit};

/// An operand cell still waiting for its branch target.
#[must_use]
struct Patch(Addr);

struct Builder<'a> {
    dict: &'a mut Dictionary,
    exit: Xt,
    lit: Xt,
    branch: Xt,
    zbranch: Xt,
    string: Xt,
    type_: Xt,
}

impl Builder<'_> {
    fn word(&mut self, name: &str) -> Result<Xt, Error> {
        Ok(self.dict.add_word(name.as_bytes())?)
    }

    fn ops(&mut self, ops: &[Op]) -> Result<(), Error> {
        for op in ops {
            match *op {
                Call(xt) => {
                    self.dict.append_cell(xt.to_cell())?;
                }
                Lit(val) => {
                    self.dict.append_cell(self.lit.to_cell())?;
                    self.dict.append_cell(val)?;
                }
            }
        }
        Ok(())
    }

    fn exit(&mut self) -> Result<(), Error> {
        self.ops(&[Call(self.exit)])
    }

    /// A straight-line word.
    fn def(&mut self, name: &str, ops: &[Op]) -> Result<Xt, Error> {
        let xt = self.word(name)?;
        self.ops(ops)?;
        self.exit()?;
        Ok(xt)
    }

    fn variable(&mut self, name: &str, addr: Addr) -> Result<Xt, Error> {
        self.def(name, &[Lit(addr as Cell)])
    }

    fn here(&self) -> Addr {
        self.dict.here()
    }

    fn forward(&mut self, branch: Xt) -> Result<Patch, Error> {
        self.dict.append_cell(branch.to_cell())?;
        Ok(Patch(self.dict.append_cell(0)?))
    }

    /// `IF`: skips ahead when the flag is zero.
    fn if_zero(&mut self) -> Result<Patch, Error> {
        self.forward(self.zbranch)
    }

    /// `AHEAD`: always skips ahead.
    fn ahead(&mut self) -> Result<Patch, Error> {
        self.forward(self.branch)
    }

    /// `THEN`: resolves a forward branch to `here`.
    fn then(&mut self, patch: Patch) -> Result<(), Error> {
        let here = self.here();
        self.resolve(patch, here)
    }

    fn resolve(&mut self, patch: Patch, target: Addr) -> Result<(), Error> {
        self.dict.store(patch.0, target as Cell)
    }

    /// `AGAIN`
    fn again(&mut self, dest: Addr) -> Result<(), Error> {
        self.dict.append_cell(self.branch.to_cell())?;
        self.dict.append_cell(dest as Cell)?;
        Ok(())
    }

    /// Compiles `." text"`.
    fn print(&mut self, text: &str) -> Result<(), Error> {
        self.dict.append_cell(self.string.to_cell())?;
        self.dict.append_counted(text.as_bytes())?;
        self.dict.append_cell(self.type_.to_cell())?;
        Ok(())
    }

    fn immediate(&mut self, xt: Xt) -> Result<(), Error> {
        self.dict.set_immediate(xt)
    }
}

fn native(dict: &Dictionary, name: &str) -> Result<Xt, Error> {
    dict.find(name.as_bytes())?.ok_or(Error::NullWord)
}

/// Natives the bootstrap code refers to.
struct Natives {
    exit: Xt,
    lit: Xt,
    sub: Xt,
    mul: Xt,
    fetch: Xt,
    store: Xt,
    cfetch: Xt,
    cstore: Xt,
    to_r: Xt,
    from_r: Xt,
    drop: Xt,
    dup: Xt,
    swap: Xt,
    branch: Xt,
    zbranch: Xt,
    emit: Xt,
    accept: Xt,
    word: Xt,
    type_: Xt,
    create: Xt,
    find: Xt,
    mul_scale: Xt,
    dplus: Xt,
    equal: Xt,
    less: Xt,
    nand: Xt,
    string: Xt,
    clear_rs: Xt,
    clear_ds: Xt,
}

impl Natives {
    fn find(dict: &Dictionary) -> Result<Self, Error> {
        Ok(Self {
            exit: native(dict, "EXIT")?,
            lit: native(dict, "(LIT)")?,
            sub: native(dict, "-")?,
            mul: native(dict, "*")?,
            fetch: native(dict, "@")?,
            store: native(dict, "!")?,
            cfetch: native(dict, "C@")?,
            cstore: native(dict, "C!")?,
            to_r: native(dict, ">R")?,
            from_r: native(dict, "R>")?,
            drop: native(dict, "DROP")?,
            dup: native(dict, "DUP")?,
            swap: native(dict, "SWAP")?,
            branch: native(dict, "BRANCH")?,
            zbranch: native(dict, "0BRANCH")?,
            emit: native(dict, "EMIT")?,
            accept: native(dict, "ACCEPT")?,
            word: native(dict, "WORD")?,
            type_: native(dict, "TYPE")?,
            create: native(dict, "CREATE")?,
            find: native(dict, "FIND")?,
            mul_scale: native(dict, "M*/")?,
            dplus: native(dict, "D+")?,
            equal: native(dict, "=")?,
            less: native(dict, "<")?,
            nand: native(dict, "NAND")?,
            string: native(dict, "(S\")")?,
            clear_rs: native(dict, "(CLR-RET-STACK)")?,
            clear_ds: native(dict, "(CLR-DAT-STACK)")?,
        })
    }
}

/// Variables, addresses and constants.
struct Vars {
    tib: Xt,
    tib_len: Xt,
    in_: Xt,
    dp: Xt,
    lp: Xt,
    pp: Xt,
    state: Xt,
    here: Xt,
    true_: Xt,
    false_: Xt,
}

/// Stack, arithmetic and memory words.
struct StackMem {
    over: Xt,
    rot: Xt,
    two_drop: Xt,
    add: Xt,
    or: Xt,
    zero_eq: Xt,
    ge: Xt,
    cells: Xt,
    comma: Xt,
}

struct Strings {
    cr: Xt,
    bl: Xt,
    space: Xt,
    count: Xt,
    s_to_number: Xt,
}

struct IntComp {
    compile: Xt,
    reveal: Xt,
    interpret: Xt,
    quit: Xt,
}

/// Lays down the whole dictionary and makes it searchable.
pub(crate) fn populate<I: 'static>(
    dict: &mut Dictionary,
    natives: &[NativeEntry<I>],
) -> Result<Entry, Error> {
    for (id, entry) in natives.iter().enumerate() {
        dict.add_native(entry.name.as_bytes(), id, entry.immediate)?;
    }
    dict.reveal();

    let n = Natives::find(dict)?;
    let mut b = Builder {
        dict,
        exit: n.exit,
        lit: n.lit,
        branch: n.branch,
        zbranch: n.zbranch,
        string: n.string,
        type_: n.type_,
    };

    let v = b.vars(&n)?;
    let sm = b.stack_mem(&n, &v)?;
    let s = b.strings(&n, &v, &sm)?;
    let ic = b.int_comp(&n, &v, &sm, &s)?;
    b.control(&n, &v, &sm, &s, &ic)?;
    b.dict.reveal();

    debug!(
        used = b.dict.used(),
        capacity = b.dict.capacity(),
        "dictionary populated"
    );
    Ok(Entry {
        quit: ic.quit,
        interpret: ic.interpret,
    })
}

impl Builder<'_> {
    fn vars(&mut self, n: &Natives) -> Result<Vars, Error> {
        let tib = self.variable("TIB", TIB)?;
        let tib_len = self.variable("#TIB", var::TIB_LEN)?;
        let in_ = self.variable(">IN", var::IN)?;
        let dp = self.variable("DP", var::DP)?;
        let lp = self.variable("LP", var::LP)?;
        let pp = self.variable("PP", var::PP)?;
        let state = self.variable("STATE", var::STATE)?;

        let here = self.def("HERE", &[Call(dp), Call(n.fetch)])?;
        self.def("LATEST", &[Call(lp), Call(n.fetch)])?;
        // HERE 256 +
        self.def("PAD", &[Call(here), Lit(-256), Call(n.sub)])?;

        let true_ = self.def("TRUE", &[Lit(-1)])?;
        let false_ = self.def("FALSE", &[Lit(0)])?;

        Ok(Vars {
            tib,
            tib_len,
            in_,
            dp,
            lp,
            pp,
            state,
            here,
            true_,
            false_,
        })
    }

    fn stack_mem(&mut self, n: &Natives, v: &Vars) -> Result<StackMem, Error> {
        let over = self.def("OVER", &[Call(n.to_r), Call(n.dup), Call(n.from_r), Call(n.swap)])?;
        let rot = self.def("ROT", &[Call(n.to_r), Call(n.swap), Call(n.from_r), Call(n.swap)])?;
        let two_drop = self.def("2DROP", &[Call(n.drop), Call(n.drop)])?;
        let two_dup = self.def("2DUP", &[Call(over), Call(over)])?;
        let add = self.def("+", &[Lit(0), Call(n.swap), Call(n.sub), Call(n.sub)])?;
        let invert = self.def("INVERT", &[Call(n.dup), Call(n.nand)])?;
        let or = self.def("OR", &[Call(invert), Call(n.swap), Call(invert), Call(n.nand)])?;
        self.def("AND", &[Call(n.nand), Call(invert)])?;
        let zero_eq = self.def("0=", &[Call(v.false_), Call(n.equal)])?;
        self.def("<>", &[Call(n.equal), Call(zero_eq)])?;
        let le = self.def(
            "<=",
            &[
                Call(two_dup),
                Call(n.less),
                Call(n.to_r),
                Call(n.equal),
                Call(n.from_r),
                Call(or),
            ],
        )?;
        self.def(">", &[Call(le), Call(zero_eq)])?;
        let ge = self.def(">=", &[Call(n.less), Call(zero_eq)])?;

        let cells = self.def("CELLS", &[Lit(CELL as Cell), Call(n.mul)])?;
        let plus_store = self.def(
            "+!",
            &[
                Call(n.dup),
                Call(n.fetch),
                Call(n.swap),
                Call(n.to_r),
                Call(add),
                Call(n.from_r),
                Call(n.store),
            ],
        )?;
        let allot = self.def("ALLOT", &[Call(v.dp), Call(plus_store)])?;
        let comma = self.def(",", &[Call(v.here), Call(n.store), Lit(CELL as Cell), Call(allot)])?;
        self.def("C,", &[Call(v.here), Call(n.cstore), Lit(1), Call(allot)])?;

        Ok(StackMem {
            over,
            rot,
            two_drop,
            add,
            or,
            zero_eq,
            ge,
            cells,
            comma,
        })
    }

    fn strings(&mut self, n: &Natives, v: &Vars, sm: &StackMem) -> Result<Strings, Error> {
        let cr = self.def("CR", &[Lit(Cell::from(b'\n')), Call(n.emit)])?;
        let bl = self.def("BL", &[Lit(Cell::from(b' '))])?;
        let space = self.def("SPACE", &[Call(bl), Call(n.emit)])?;
        let count = self.def("COUNT", &[Call(n.dup), Lit(1), Call(sm.add), Call(n.swap), Call(n.cfetch)])?;
        let slash_string = self.def(
            "/STRING",
            &[
                Call(n.dup),
                Call(n.to_r),
                Call(n.to_r),
                Call(n.swap),
                Call(n.from_r),
                Call(sm.add),
                Call(n.swap),
                Call(n.from_r),
                Call(n.sub),
            ],
        )?;

        // ( c -- n -1 | 0 )
        let digit = self.word("DIGIT?")?;
        self.ops(&[
            Lit(Cell::from(b'0')),
            Call(n.sub),
            Call(n.dup),
            Lit(0),
            Call(n.less),
            Call(sm.over),
            Lit(10),
            Call(sm.ge),
            Call(sm.or),
        ])?;
        let is_digit = self.if_zero()?;
        self.ops(&[Call(n.drop), Call(v.false_)])?;
        let done = self.ahead()?;
        self.then(is_digit)?;
        self.ops(&[Call(v.true_)])?;
        self.then(done)?;
        self.exit()?;

        // ( ud1 a1 u1 -- ud2 a2 u2 ) Accumulates decimal digits.
        let to_number = self.word(">NUMBER")?;
        let begin = self.here();
        self.ops(&[Call(n.dup), Call(sm.zero_eq)])?;
        let more = self.if_zero()?;
        self.exit()?;
        self.then(more)?;
        self.ops(&[Call(sm.over), Call(n.cfetch), Call(digit)])?;
        let not_digit = self.if_zero()?;
        self.ops(&[
            Call(n.swap),
            Lit(1),
            Call(n.sub),
            Call(n.to_r),
            Call(n.swap),
            Lit(1),
            Call(sm.add),
            Call(n.to_r),
            Call(n.to_r),
            Lit(10),
            Lit(1),
            Call(n.mul_scale),
            Call(n.from_r),
            Lit(0),
            Call(n.dplus),
            Call(n.from_r),
            Call(n.from_r),
        ])?;
        let next = self.ahead()?;
        self.then(not_digit)?;
        self.exit()?;
        self.then(next)?;
        self.again(begin)?;
        self.exit()?;

        // ( a1 u1 -- n 0 0 | d -1 0 | a2 u2 )
        //
        // An optional leading `-`, then digits with at most one `.` among
        // them. A `.` anywhere makes the result a double.
        let s_to_number = self.word("S>NUMBER?")?;
        self.ops(&[Call(sm.over), Call(n.cfetch), Lit(Cell::from(b'-')), Call(n.equal)])?;
        let positive = self.if_zero()?;
        self.ops(&[Lit(-1), Call(n.to_r), Lit(1), Call(slash_string)])?;
        let signed = self.ahead()?;
        self.then(positive)?;
        self.ops(&[Lit(1), Call(n.to_r)])?;
        self.then(signed)?;
        self.ops(&[
            Call(n.to_r),
            Call(n.to_r),
            Lit(0),
            Lit(0),
            Call(n.from_r),
            Call(n.from_r),
            Call(to_number),
        ])?;
        // ( ud a u ) R: sign  -- push TRUE when the result is a single
        self.ops(&[Call(n.dup), Call(sm.zero_eq)])?;
        let rest = self.if_zero()?;
        self.ops(&[Call(v.true_)])?;
        let single = self.ahead()?;
        self.then(rest)?;
        self.ops(&[Call(sm.over), Call(n.cfetch), Lit(Cell::from(b'.')), Call(n.equal)])?;
        let no_dot = self.if_zero()?;
        self.ops(&[Lit(1), Call(slash_string), Call(to_number), Call(v.false_)])?;
        let dotted = self.ahead()?;
        self.then(no_dot)?;
        self.ops(&[Call(v.true_)])?;
        self.then(dotted)?;
        self.then(single)?;
        self.ops(&[Call(n.to_r), Call(n.dup), Call(sm.zero_eq)])?;
        let failed = self.if_zero()?;
        self.ops(&[
            Call(sm.two_drop),
            Call(n.from_r),
            Call(n.from_r),
            Call(n.swap),
            Call(n.to_r),
            Lit(1),
            Call(n.mul_scale),
            Call(n.from_r),
        ])?;
        let double = self.if_zero()?;
        self.ops(&[Call(n.drop), Lit(0), Lit(0)])?;
        let parsed = self.ahead()?;
        self.then(double)?;
        self.ops(&[Lit(-1), Lit(0)])?;
        self.then(parsed)?;
        let done = self.ahead()?;
        self.then(failed)?;
        self.ops(&[
            Call(n.from_r),
            Call(n.from_r),
            Call(sm.two_drop),
            Call(sm.rot),
            Call(n.drop),
            Call(sm.rot),
            Call(n.drop),
        ])?;
        self.then(done)?;
        self.exit()?;

        Ok(Strings {
            cr,
            bl,
            space,
            count,
            s_to_number,
        })
    }

    fn int_comp(
        &mut self,
        n: &Natives,
        v: &Vars,
        sm: &StackMem,
        s: &Strings,
    ) -> Result<IntComp, Error> {
        self.def("SOURCE", &[Call(v.tib), Call(v.tib_len), Call(n.fetch)])?;

        // ( -- f )
        let refill = self.word("REFILL")?;
        let tib_size = (self.dict.tib_size() as Cell).max(0);
        self.ops(&[
            Call(v.tib),
            Lit(tib_size),
            Call(n.accept),
            Call(n.dup),
            Lit(0),
            Call(n.less),
        ])?;
        let got_line = self.if_zero()?;
        self.ops(&[Call(n.drop), Call(v.false_)])?;
        self.exit()?;
        self.then(got_line)?;
        self.ops(&[
            Call(v.tib_len),
            Call(n.store),
            Lit(0),
            Call(v.in_),
            Call(n.store),
            Call(s.space),
            Call(v.true_),
        ])?;
        self.exit()?;

        // The xt is stored into the body just ahead of being reached.
        let exec = self.word("EXECUTE")?;
        self.dict.append_cell(n.lit.to_cell())?;
        let slot_operand = self.dict.append_cell(0)?;
        self.ops(&[Call(n.store)])?;
        let slot = self.dict.append_cell(0)?;
        self.exit()?;
        self.dict.store(slot_operand, slot as Cell)?;

        let compile = self.def("COMPILE,", &[Call(sm.comma)])?;
        let reveal = self.def("REVEAL", &[Call(v.pp), Call(n.fetch), Call(v.lp), Call(n.store)])?;
        let lbracket = self.def("[", &[Call(v.false_), Call(v.state), Call(n.store)])?;
        self.immediate(lbracket)?;
        let rbracket = self.def("]", &[Call(v.true_), Call(v.state), Call(n.store)])?;

        // QUIT does not exist yet, so its cell is patched below.
        let abort = self.word("ABORT")?;
        self.ops(&[
            Call(n.clear_rs),
            Call(n.clear_ds),
            Call(v.lp),
            Call(n.fetch),
            Call(v.pp),
            Call(n.store),
        ])?;
        let abort_quit = self.dict.append_cell(0)?;
        self.exit()?;

        // ( c -- )
        let not_found = self.word("(ERR-NOT-FOUND)")?;
        self.ops(&[Call(s.cr)])?;
        self.print("ERROR: '")?;
        self.ops(&[Call(s.count), Call(n.type_)])?;
        self.print("' word not found")?;
        self.ops(&[Call(s.cr), Call(abort)])?;
        self.exit()?;

        self.def(":", &[Call(n.create), Call(rbracket)])?;
        let semicolon = self.def(
            ";",
            &[
                Lit(n.exit.to_cell()),
                Call(compile),
                Call(reveal),
                Call(lbracket),
            ],
        )?;
        self.immediate(semicolon)?;

        let interpret = self.word("INTERPRET")?;
        self.ops(&[Lit(0), Call(v.in_), Call(n.store)])?;
        let begin = self.here();
        self.ops(&[
            Call(s.bl),
            Call(n.word),
            Call(n.dup),
            Call(s.count),
            Call(n.swap),
            Call(n.drop),
        ])?;
        let end_of_line = self.if_zero()?;
        self.ops(&[Call(n.find), Call(v.state), Call(n.fetch)])?;
        let interpreting = self.if_zero()?;

        // compiling: ( c 0 | xt 1 | xt -1 )
        self.ops(&[Call(n.dup)])?;
        let unknown = self.if_zero()?;
        self.ops(&[Lit(1), Call(n.equal)])?;
        let not_immediate = self.if_zero()?;
        self.ops(&[Call(exec)])?;
        let compiled = self.ahead()?;
        self.then(not_immediate)?;
        self.ops(&[Call(compile)])?;
        self.then(compiled)?;
        let compiled_word = self.ahead()?;
        self.then(unknown)?;
        self.ops(&[Call(n.drop), Call(n.dup), Call(s.count), Call(s.s_to_number)])?;
        let number = self.if_zero()?;
        self.ops(&[Call(n.drop), Call(not_found)])?;
        let compiled_error = self.ahead()?;
        self.then(number)?;
        // ( c n 0 | c d -1 ) a double compiles its low cell first
        let single = self.if_zero()?;
        self.ops(&[
            Call(n.swap),
            Lit(n.lit.to_cell()),
            Call(compile),
            Call(sm.comma),
        ])?;
        self.then(single)?;
        self.ops(&[
            Lit(n.lit.to_cell()),
            Call(compile),
            Call(sm.comma),
            Call(n.drop),
        ])?;
        self.then(compiled_error)?;
        self.then(compiled_word)?;
        let next_word = self.ahead()?;

        // interpreting: ( c 0 | xt 1 | xt -1 )
        self.then(interpreting)?;
        let unknown = self.if_zero()?;
        self.ops(&[Call(exec)])?;
        let executed = self.ahead()?;
        self.then(unknown)?;
        self.ops(&[Call(n.dup), Call(s.count), Call(s.s_to_number)])?;
        let number = self.if_zero()?;
        self.ops(&[Call(n.drop), Call(not_found)])?;
        self.then(number)?;
        let single = self.if_zero()?;
        self.ops(&[Call(sm.rot)])?;
        let pushed = self.ahead()?;
        self.then(single)?;
        self.ops(&[Call(n.swap)])?;
        self.then(pushed)?;
        self.ops(&[Call(n.drop)])?;
        self.then(executed)?;

        self.then(next_word)?;
        self.again(begin)?;
        self.then(end_of_line)?;
        self.ops(&[Call(n.drop)])?;
        self.exit()?;

        let quit = self.word("QUIT")?;
        self.ops(&[Call(n.clear_rs), Call(lbracket)])?;
        let begin = self.here();
        self.ops(&[Call(refill)])?;
        let end_of_input = self.if_zero()?;
        self.ops(&[Call(interpret)])?;
        self.print(" ok")?;
        self.ops(&[Call(s.cr)])?;
        self.again(begin)?;
        self.then(end_of_input)?;
        self.exit()?;
        self.dict.store(abort_quit, quit.to_cell())?;

        Ok(IntComp {
            compile,
            reveal,
            interpret,
            quit,
        })
    }

    /// Control flow and defining words, built from the same primitives the
    /// compiler uses.
    fn control(
        &mut self,
        n: &Natives,
        v: &Vars,
        sm: &StackMem,
        s: &Strings,
        ic: &IntComp,
    ) -> Result<(), Error> {
        let zbranch = Lit(n.zbranch.to_cell());
        let branch = Lit(n.branch.to_cell());

        let if_ = self.def("IF", &[zbranch, Call(ic.compile), Call(v.here), Lit(0), Call(sm.comma)])?;
        let then = self.def("THEN", &[Call(v.here), Call(n.swap), Call(n.store)])?;
        let else_ = self.def(
            "ELSE",
            &[
                branch,
                Call(ic.compile),
                Call(v.here),
                Lit(0),
                Call(sm.comma),
                Call(n.swap),
                Call(v.here),
                Call(n.swap),
                Call(n.store),
            ],
        )?;
        let begin = self.def("BEGIN", &[Call(v.here)])?;
        let again = self.def("AGAIN", &[branch, Call(ic.compile), Call(sm.comma)])?;
        let until = self.def("UNTIL", &[zbranch, Call(ic.compile), Call(sm.comma)])?;
        let while_ = self.def("WHILE", &[Call(if_), Call(n.swap)])?;
        let repeat = self.def("REPEAT", &[Call(again), Call(then)])?;
        for xt in [if_, then, else_, begin, again, until, while_, repeat] {
            self.immediate(xt)?;
        }

        // ( "name" -- xt )
        self.def("'", &[Call(s.bl), Call(n.word), Call(n.find), Call(n.drop)])?;
        let literal = self.def("LITERAL", &[Lit(n.lit.to_cell()), Call(ic.compile), Call(sm.comma)])?;
        self.immediate(literal)?;

        // ( n "name" -- )
        self.def(
            "CONSTANT",
            &[
                Call(n.create),
                Lit(n.lit.to_cell()),
                Call(ic.compile),
                Call(sm.comma),
                Lit(n.exit.to_cell()),
                Call(ic.compile),
                Call(ic.reveal),
            ],
        )?;
        // ( "name" -- ) The body is `(LIT) addr EXIT`, with the value cell
        // right behind it.
        self.def(
            "VARIABLE",
            &[
                Call(n.create),
                Lit(n.lit.to_cell()),
                Call(ic.compile),
                Call(v.here),
                Lit(2),
                Call(sm.cells),
                Call(sm.add),
                Call(sm.comma),
                Lit(n.exit.to_cell()),
                Call(ic.compile),
                Lit(0),
                Call(sm.comma),
                Call(ic.reveal),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        testutil::{blocking_runtest, new_forth, ScriptIo},
        Error, Forth, Params, CELL,
    };

    fn lines(forth: &mut Forth<ScriptIo>, lines: &[(&str, &str)]) {
        for (line, out) in lines {
            println!("{line}");
            forth.evaluate(line).unwrap();
            assert_eq!(forth.io().output_str(), *out);
            forth.io_mut().clear_output();
        }
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn stack_and_logic() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        lines(
            &mut forth,
            &[
                ("1 2 OVER . . .", "1 2 1 "),
                ("1 2 3 ROT . . .", "1 3 2 "),
                ("1 2 2DUP . . . .", "2 1 2 1 "),
                ("1 2 3 2DROP .", "1 "),
                ("5 INVERT .", "-6 "),
                ("12 10 AND . 12 10 OR .", "8 14 "),
                ("TRUE . FALSE .", "-1 0 "),
                ("0 0= . 7 0= .", "-1 0 "),
                ("1 2 <> . 2 2 <> .", "-1 0 "),
                ("3 4 > . 4 3 > . 3 3 > .", "0 -1 0 "),
                ("3 4 <= . 4 4 <= . 5 4 <= .", "-1 -1 0 "),
                ("3 4 >= . 4 4 >= .", "0 -1 "),
                ("57 DIGIT? . . 65 DIGIT? .", "-1 9 0 "),
            ],
        );
    }

    #[test]
    fn memory_words() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        let cells = format!("{} ", 2 * CELL);
        let comma = format!("{CELL} ");
        lines(
            &mut forth,
            &[
                ("2 CELLS .", cells.as_str()),
                ("HERE 5 , HERE SWAP - .", comma.as_str()),
                ("HERE 3 ALLOT HERE SWAP - .", "3 "),
                ("HERE 65 C, C@ EMIT", "A"),
                ("PAD HERE - .", "256 "),
                ("VARIABLE V 5 V ! 3 V +! V @ .", "8 "),
                ("3 CONSTANT THREE THREE THREE * .", "9 "),
                ("LATEST PP @ = .", "-1 "),
                ("STATE @ .", "0 "),
            ],
        );
    }

    #[test]
    fn input_buffer() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        lines(
            &mut forth,
            &[
                ("SOURCE TYPE", "SOURCE TYPE"),
                ("SOURCE SWAP DROP .", "18 "),
                ("TIB SOURCE DROP = .", "-1 "),
                ("#TIB @ .", "8 "),
                (">IN @ .", "4 "),
                ("SOURCE 7 /STRING TYPE", "7 /STRING TYPE"),
                ("BL . SPACE CR", "32  \n"),
            ],
        );
    }

    #[test]
    fn numbers() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        lines(
            &mut forth,
            &[
                ("-42 .", "-42 "),
                ("007 -0 . .", "0 7 "),
                ("12. . .", "0 12 "),
                ("1.5 . .", "0 15 "),
                ("-1.5 . .", "-1 -15 "),
                ("1. 2. D+ . .", "0 3 "),
                ("7. 10 1 M*/ . .", "0 70 "),
                (": D2 12. -3 ; D2 . . .", "-3 0 12 "),
                ("1.2.3", "\nERROR: '1.2.3' word not found\n"),
                ("12X", "\nERROR: '12X' word not found\n"),
            ],
        );
    }

    #[test]
    fn definitions() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        lines(
            &mut forth,
            &[
                // a word is not visible inside its own definition
                (": FOO FOO ;", "\nERROR: 'FOO' word not found\n"),
                (": X 1 ; : X X 1 + ; X .", "2 "),
                (": I1 43 EMIT ; IMMEDIATE", ""),
                (": USE I1 ;", "+"),
                ("USE", ""),
                (": L [ 6 7 * ] LITERAL ; L .", "42 "),
                (": ST 42 EMIT ; ' ST EXECUTE", "*"),
                ("9 ' DUP EXECUTE * .", "81 "),
                (": CD BEGIN DUP WHILE DUP . 1 - REPEAT DROP ; 3 CD", "3 2 1 "),
                (": LP BEGIN DUP . 1 - DUP 0= IF DROP EXIT THEN AGAIN ; 2 LP", "2 1 "),
                (": PN 0 < IF 45 ELSE 43 THEN EMIT ; -1 PN 1 PN", "-+"),
            ],
        );
        assert!(forth.find("FOO").is_none());
        assert!(forth.find("I1").unwrap().1);
        assert!(!forth.find("USE").unwrap().1);
    }

    #[test]
    fn aborts() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        forth.evaluate("1 2 ABORT 3 .").unwrap();
        assert_eq!(forth.io().output_str(), "");
        assert!(forth.data_stack().is_empty());

        assert_eq!(
            forth.evaluate(": P .\" hi\" ;"),
            Err(Error::NotImplemented(".\""))
        );
        assert_eq!(forth.io().output_str(), ".\" : not imp");
        assert!(forth.find("P").is_none());
        forth.io_mut().clear_output();

        assert_eq!(
            forth.evaluate("1. 10 2 M*/"),
            Err(Error::NotImplemented("M*/"))
        );
        assert_eq!(forth.io().output_str(), "M*/ +n2 != 1");
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn ui() {
        blocking_runtest(
            r#"
            ( data_stack_elems 16 )
            ( tib_size 96 )

            > : SQ DUP * ;
            > 7 SQ .
            < 49
            > : SUM BEGIN OVER WHILE OVER + SWAP 1 - SWAP REPEAT SWAP DROP ;
            > 4 0 SUM .
            < 10
            > SQQ
            <
            < ERROR: 'SQQ' word not found
            x DROP
            > 1 2 .S
            < 1 2
        "#,
        );
    }
}
